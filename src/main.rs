use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use receipt_ai_rust::{cli, config, error, extractor, logging, menu, pipeline, staging};
use cli::{Cli, Commands};
use config::{Config, FolderLayout};
use error::Result;
use menu::MenuAction;
use pipeline::{ImportPipeline, ReceiptProcessor};
use receipt_ai_rust::ai_provider::AiProvider;
use staging::{CsvStagingStore, StagingStore};

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let provider = cli.ai_provider.unwrap_or(config.ai_provider);

    match cli.command {
        Commands::Process => {
            let layout = config.folders()?;
            run_process(&config, &layout, provider, cli.verbose)?;
        }

        Commands::Import => {
            let layout = config.folders()?;
            run_import(&layout)?;
        }

        Commands::Staging { list } => {
            let layout = config.folders()?;
            show_staging(&layout, list)?;
        }

        Commands::Config { set_api_key, show } => {
            let mut config = config;

            if let Some(key) = set_api_key {
                config.set_api_key(key)?;
                println!("✔ APIキーを設定しました");
            }

            if show {
                show_config(&config);
            }
        }

        Commands::Menu => {
            // フォルダ設定が足りなければメニューに入る前に終了
            let layout = config.folders()?;
            println!("🧾 receipt-ai - メニュー\n");
            menu::run_menu(|action| match action {
                MenuAction::Process => run_process(&config, &layout, provider, cli.verbose),
                MenuAction::Import => run_import(&layout),
                MenuAction::Staging => show_staging(&layout, true),
                MenuAction::ShowConfig => {
                    show_config(&config);
                    Ok(())
                }
                MenuAction::Quit => Ok(()),
            })?;
        }
    }

    Ok(())
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    if let Ok(style) =
        ProgressStyle::with_template("  [{elapsed_precise}] {bar:30.cyan/blue} {pos}/{len} {wide_msg}")
    {
        bar.set_style(style.progress_chars("█▉▊▋▌▍▎▏ "));
    }
    bar
}

fn run_process(
    config: &Config,
    layout: &FolderLayout,
    provider: AiProvider,
    verbose: bool,
) -> Result<()> {
    println!("🧾 receipt-ai - レシート読取 ({})\n", provider);

    let extractor = extractor::create_extractor(config, provider, verbose)?;
    let processor = ReceiptProcessor::new(layout, extractor.as_ref()).with_progress(progress_bar());

    println!("[1/2] {} を処理中...", layout.incoming.display());
    let summary = processor.process_all()?;

    println!("[2/2] 結果");
    println!("  ✔ 読取完了: {}件", summary.completed);
    println!("  ✖ 読取失敗: {}件 → {}", summary.failed, layout.failed.display());
    println!("  ↺ 重複スキップ: {}件", summary.duplicates);
    for (file, reason) in &summary.unstaged {
        println!("  ⚠ {} はfailedへ移しましたがステージングに記録できませんでした: {}", file, reason);
    }
    for (file, reason) in &summary.errors {
        println!("  ⚠ {}: {}", file, reason);
    }

    if summary.total() == 0 {
        println!("\n処理対象のファイルがありません");
    } else {
        println!("\n✅ 処理完了: {}", layout.staging_csv.display());
    }
    Ok(())
}

fn run_import(layout: &FolderLayout) -> Result<()> {
    println!("📒 receipt-ai - 台帳取込\n");

    let summary = ImportPipeline::new(layout).with_progress(progress_bar()).run()?;

    for name in &summary.imported {
        println!("  ✔ {}", name);
    }
    for (file, reason) in &summary.failed {
        println!("  ✖ {}: {}", file, reason);
    }
    if summary.skipped > 0 {
        println!("  - 読取失敗の行 {}件はステージングに残しました", summary.skipped);
    }

    println!(
        "\n✅ 取込完了: {}件 → {}",
        summary.imported.len(),
        layout.workbook.display()
    );
    Ok(())
}

fn show_staging(layout: &FolderLayout, list: bool) -> Result<()> {
    let data = CsvStagingStore.read(&layout.staging_csv)?;

    if !data.exists {
        println!("ステージングCSVが存在しません: {}", data.file_path.display());
        return Ok(());
    }

    println!("ステージング情報:");
    println!("  パス: {}", data.file_path.display());
    println!("  件数: {}", data.entry_count);
    if let Some(modified) = data.modified_time {
        println!("  更新日時: {}", modified.format("%Y-%m-%d %H:%M:%S"));
    }

    if list && !data.is_empty() {
        println!();
        for (i, row) in data.receipts.iter().enumerate() {
            let status = match row.error_kind() {
                Some(kind) => format!("[{}]", kind),
                None => format!("{} {}", row.amount, row.currency),
            };
            println!("  {:>3}. {} {} {}", i + 1, row.date, status, row.done_filename);
        }
    }
    Ok(())
}

fn show_config(config: &Config) {
    let path_or_unset = |p: &Option<std::path::PathBuf>| {
        p.as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "未設定".to_string())
    };

    println!("設定:");
    if let Ok(path) = Config::config_path() {
        println!("  設定ファイル: {}", path.display());
    }
    println!("  incoming: {}", path_or_unset(&config.incoming_dir));
    println!("  scanned: {}", path_or_unset(&config.scanned_dir));
    println!("  imported: {}", path_or_unset(&config.imported_dir));
    println!("  failed: {}", path_or_unset(&config.failed_dir));
    println!("  ステージングCSV: {}", path_or_unset(&config.staging_csv));
    println!("  台帳: {}", path_or_unset(&config.workbook_path));
    println!("  AIプロバイダ: {}", config.ai_provider);
    println!("  モデル: {}", config.model);
    println!("  タイムアウト: {}秒", config.timeout_seconds);
    println!("  APIキー: {}", if config.api_key.is_some() { "設定済み" } else { "未設定" });
}
