//! # HTTP 服务器
//!
//! Axum 服务器，承载认证接口与健康检查

use axum::Router;
use std::net::SocketAddr;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::middleware::request_id_middleware;
use crate::app::AppContext;
use crate::error::{AuthError, Result};
use crate::{
    linfo,
    logging::{LogComponent, LogStage},
};

/// 服务器应用状态
#[derive(Clone)]
pub struct AppState {
    context: Arc<AppContext>,
}

impl AppState {
    #[must_use]
    pub const fn new(context: Arc<AppContext>) -> Self {
        Self { context }
    }

    /// 单个请求内全部 I/O 的时间预算
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.context.config.server.request_timeout)
    }
}

impl Deref for AppState {
    type Target = AppContext;

    fn deref(&self) -> &Self::Target {
        &self.context
    }
}

/// 认证服务 HTTP 服务器
pub struct AuthServer {
    bind_address: String,
    router: Router,
}

impl AuthServer {
    /// 创建服务器
    #[must_use]
    pub fn new(context: Arc<AppContext>) -> Self {
        let bind_address = context.config.server.bind_address();
        let router = Self::create_router(AppState::new(context));
        Self {
            bind_address,
            router,
        }
    }

    /// 路由与中间件
    pub fn create_router(state: AppState) -> Router {
        super::routes::create_routes(state).layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http()),
        )
    }

    #[must_use]
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// 启动服务器，`shutdown` 被取消后优雅退出
    pub async fn serve(self, shutdown: CancellationToken) -> Result<()> {
        let addr: SocketAddr = self.bind_address.parse().map_err(|e| {
            AuthError::config_with_source(format!("无效的监听地址 '{}'", self.bind_address), e)
        })?;

        let listener = TcpListener::bind(&addr).await?;
        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::Server,
            "server_start",
            "认证服务开始监听",
            address = %addr
        );

        axum::serve(
            listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

        linfo!(
            "system",
            LogStage::Shutdown,
            LogComponent::Server,
            "server_stopped",
            "认证服务已停止"
        );
        Ok(())
    }
}
