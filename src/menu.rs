//! 対話メニュー
//!
//! 処理・取込・ステージング確認を選んで繰り返し実行する

use crate::error::{ReceiptAiError, Result};
use dialoguer::Select;

/// メニュー項目
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    /// incomingを処理
    Process,
    /// ステージングを台帳に取込
    Import,
    /// ステージング情報を表示
    Staging,
    /// 設定を表示
    ShowConfig,
    Quit,
}

impl MenuAction {
    pub const ALL: [MenuAction; 5] = [
        MenuAction::Process,
        MenuAction::Import,
        MenuAction::Staging,
        MenuAction::ShowConfig,
        MenuAction::Quit,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MenuAction::Process => "レシートを読み取る (incoming → scanned)",
            MenuAction::Import => "台帳に取り込む (scanned → imported)",
            MenuAction::Staging => "ステージングを確認",
            MenuAction::ShowConfig => "設定を表示",
            MenuAction::Quit => "終了",
        }
    }
}

/// 終了を選ぶまでメニューを繰り返す
///
/// 各操作のエラーは表示して続行する
pub fn run_menu<F>(mut dispatch: F) -> Result<()>
where
    F: FnMut(MenuAction) -> Result<()>,
{
    let labels: Vec<&str> = MenuAction::ALL.iter().map(|a| a.label()).collect();

    loop {
        let selection = Select::new()
            .with_prompt("操作を選択")
            .items(&labels)
            .default(0)
            .interact_opt()
            .map_err(|e| ReceiptAiError::Prompt(e.to_string()))?;

        // Esc / q はQuit扱い
        let action = selection
            .and_then(|i| MenuAction::ALL.get(i).copied())
            .unwrap_or(MenuAction::Quit);

        if action == MenuAction::Quit {
            break;
        }

        if let Err(e) = dispatch(action) {
            println!("❌ {}\n", e);
        }
        println!();
    }

    Ok(())
}
