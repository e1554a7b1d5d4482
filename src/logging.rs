//! ログ初期化
//!
//! `RUST_LOG` があればそれを優先。なければ info（`--verbose` で debug）

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter_layer = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("receipt_ai_rust={}", default_level)));

    // 進捗表示はstdoutを使うのでログはstderrへ
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .with(filter_layer)
        .try_init();
}
