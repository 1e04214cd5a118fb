//! # Session Authority 主程序

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use session_authority::{
    CallContext, Result,
    api::AuthServer,
    app::AppContext,
    config::ConfigManager,
    lerror, linfo,
    logging::{self, LogComponent, LogStage},
};

/// 凭证与会话权威服务
#[derive(Debug, Parser)]
#[command(name = "session-authority", version, about)]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// 日志级别（`RUST_LOG` 优先）
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 启动 HTTP 服务（默认）
    Serve,
    /// 只执行数据库迁移
    Migrate,
    /// 停用账户并退役其全部会话
    Deactivate {
        /// 账户ID
        #[arg(long)]
        user_id: i32,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_optimized_logging(cli.log_level.as_ref());

    if let Err(e) = run(cli).await {
        lerror!(
            "system",
            LogStage::Shutdown,
            LogComponent::Main,
            "fatal",
            "服务异常退出",
            error = ?e
        );
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let path = ConfigManager::resolve_path(cli.config.as_deref());
    let config = ConfigManager::from_file(&path)?.config();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Migrate => {
            let db = session_authority::database::init_database(&config.database).await?;
            session_authority::database::run_migrations(&db).await?;
            linfo!(
                "system",
                LogStage::Startup,
                LogComponent::Database,
                "migrate",
                "数据库迁移完成"
            );
            Ok(())
        }
        Command::Deactivate { user_id } => {
            let context = AppContext::build(config).await?;
            let retired = context
                .authority
                .deactivate_account(&CallContext::new(), user_id)
                .await?;
            linfo!(
                "system",
                LogStage::Session,
                LogComponent::Main,
                "deactivate",
                "账户已停用",
                user_id = user_id,
                retired = retired
            );
            Ok(())
        }
    }
}

async fn serve(config: Arc<session_authority::AppConfig>) -> Result<()> {
    let context = Arc::new(AppContext::build(config).await?);
    let shutdown = CancellationToken::new();

    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                linfo!(
                    "system",
                    LogStage::Shutdown,
                    LogComponent::Main,
                    "signal",
                    "收到退出信号"
                );
                signal.cancel();
            }
            Err(e) => {
                lerror!(
                    "system",
                    LogStage::Startup,
                    LogComponent::Main,
                    "signal_handler_failed",
                    "无法监听退出信号",
                    error = %e
                );
            }
        }
    });

    AuthServer::new(context).serve(shutdown).await
}
