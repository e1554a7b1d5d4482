use clap::{Parser, Subcommand};
use crate::ai_provider::AiProvider;

#[derive(Parser)]
#[command(name = "receipt-ai")]
#[command(about = "レシートAI読取・ステージング・台帳取込ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// AIプロバイダ (claude/gemini)。省略時は設定ファイルの値
    #[arg(long, global = true)]
    pub ai_provider: Option<AiProvider>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// incomingフォルダのレシートを読み取ってステージングCSVに追記
    Process,

    /// ステージングCSVの行を台帳に取込み、ファイルをimportedへ移動
    Import,

    /// ステージングCSVの情報を表示
    Staging {
        /// 行の内容も表示
        #[arg(short, long)]
        list: bool,
    },

    /// 設定を管理
    Config {
        /// Gemini APIキーを設定
        #[arg(long)]
        set_api_key: Option<String>,

        /// 現在の設定を表示
        #[arg(long)]
        show: bool,
    },

    /// 対話メニュー
    Menu,
}
