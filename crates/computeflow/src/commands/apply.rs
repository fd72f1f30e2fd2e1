use super::{confirm, connect, load_manifest, print_plan};
use colored::Colorize;
use std::path::Path;

pub async fn handle(config: Option<&Path>, yes: bool) -> anyhow::Result<()> {
    let (_, manifest) = load_manifest(config)?;
    println!("{}", format!("EC2 ({}) に接続中...", manifest.region).blue());
    let reconciler = connect(&manifest).await;
    let desired = &manifest.instance;

    let Some(current) = reconciler
        .find(manifest.instance_id.as_deref(), &desired.name)
        .await?
    else {
        println!();
        println!(
            "{}",
            format!("インスタンス '{}' を作成します", desired.name).bold()
        );
        if !yes && !confirm("続行しますか?")? {
            println!("{}", "キャンセルしました。".yellow());
            return Ok(());
        }
        let instance = reconciler.create(desired).await?;
        println!(
            "{}",
            format!("✓ インスタンスを作成しました: {}", instance.id)
                .green()
                .bold()
        );
        return Ok(());
    };

    let plan = reconciler.diff(&current, desired).await?;
    println!();
    println!("インスタンス: {} ({})", current.id.cyan(), current.state);
    print_plan(&plan);

    if !plan.has_updates() {
        println!();
        println!("{}", "✓ 差分はありません".green().bold());
        return Ok(());
    }

    println!();
    if !yes && !confirm("変更を適用しますか?")? {
        println!("{}", "キャンセルしました。".yellow());
        return Ok(());
    }

    match reconciler.reconcile(current, desired).await {
        Ok(outcome) => {
            for attribute in &outcome.applied {
                println!("  {} {}", "✓".green(), attribute);
            }
            for attribute in &outcome.skipped {
                println!("  {} {} (スキップ)", "-".dimmed(), attribute);
            }
            println!();
            if outcome.plan_applied() {
                println!("{}", "✓ 適用が完了しました".green().bold());
            } else {
                println!("{}", "適用できる変更はありませんでした".yellow());
            }
            Ok(())
        }
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ 適用に失敗しました".red().bold());
            eprintln!("  {}", e);
            eprintln!(
                "{}",
                "適用済みの変更はそのまま残ります。再実行すると残りを収束させます。".yellow()
            );
            Err(e.into())
        }
    }
}
