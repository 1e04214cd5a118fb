//! # 错误处理宏

/// 快速创建配置错误的宏
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::error::AuthError::config($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::AuthError::config(format!($fmt, $($arg)*))
    };
}

/// 快速创建内部错误的宏
#[macro_export]
macro_rules! internal_error {
    ($msg:expr) => {
        $crate::error::AuthError::internal($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::AuthError::internal(format!($fmt, $($arg)*))
    };
}

/// 确保条件成立，否则返回配置错误
#[macro_export]
macro_rules! ensure_config {
    ($cond:expr, $msg:expr) => {
        if !($cond) {
            return Err($crate::config_error!($msg));
        }
    };
    ($cond:expr, $fmt:expr, $($arg:tt)*) => {
        if !($cond) {
            return Err($crate::config_error!($fmt, $($arg)*));
        }
    };
}

/// 确保请求字段满足条件，否则返回请求校验错误
#[macro_export]
macro_rules! ensure_request {
    ($cond:expr, $field:expr, $msg:expr) => {
        if !($cond) {
            return Err($crate::error::AuthError::invalid_request(
                $msg,
                Some($field.to_string()),
            ));
        }
    };
}
