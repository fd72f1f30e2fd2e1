use super::{confirm, connect, load_manifest};
use colored::Colorize;
use std::path::Path;

pub async fn handle(config: Option<&Path>, yes: bool) -> anyhow::Result<()> {
    let (_, manifest) = load_manifest(config)?;
    println!("{}", format!("EC2 ({}) に接続中...", manifest.region).blue());
    let reconciler = connect(&manifest).await;

    let Some(instance) = reconciler
        .find(manifest.instance_id.as_deref(), &manifest.instance.name)
        .await?
    else {
        println!(
            "{}",
            format!("インスタンス '{}' は存在しません", manifest.instance.name).yellow()
        );
        return Ok(());
    };

    println!();
    println!(
        "{}",
        format!("インスタンス {} ({}) を削除します", instance.id, manifest.instance.name)
            .red()
            .bold()
    );
    if !yes && !confirm("本当に削除しますか?")? {
        println!("{}", "キャンセルしました。".yellow());
        return Ok(());
    }

    reconciler.delete(&instance.id).await?;
    println!("{}", "✓ 削除を開始しました".green().bold());
    Ok(())
}
