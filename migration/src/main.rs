use sea_orm_migration::prelude::*;
use std::env;

fn main() {
    // 未设置 DATABASE_URL 时默认使用 data/session-authority.db
    if env::var("DATABASE_URL").is_err() {
        let in_migration_dir = env::current_dir()
            .map(|dir| dir.ends_with("migration"))
            .unwrap_or(false);
        let db_path = if in_migration_dir {
            "../data/session-authority.db"
        } else {
            "data/session-authority.db"
        };
        // SAFETY: 运行时尚未创建，进程内只有主线程
        unsafe {
            env::set_var("DATABASE_URL", format!("sqlite://{db_path}?mode=rwc"));
        }
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("无法创建 tokio 运行时: {e}");
            std::process::exit(1);
        }
    };
    runtime.block_on(cli::run_cli(migration::Migrator));
}
