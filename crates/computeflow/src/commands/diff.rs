use super::{connect, load_manifest, print_plan};
use colored::Colorize;
use std::path::Path;

pub async fn handle(config: Option<&Path>, json: bool) -> anyhow::Result<()> {
    // --json のときは stdout に JSON 以外を出さない
    let (_, manifest) = if json {
        computeflow_config::load(config)?
    } else {
        let loaded = load_manifest(config)?;
        println!("{}", format!("EC2 ({}) に接続中...", loaded.1.region).blue());
        loaded
    };

    let reconciler = connect(&manifest).await;
    let observation = reconciler
        .observe(manifest.instance_id.as_deref(), &manifest.instance)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&observation)?);
        return Ok(());
    }

    println!();
    if !observation.exists {
        println!(
            "{}",
            format!(
                "インスタンス '{}' は存在しません (apply で作成されます)",
                manifest.instance.name
            )
            .yellow()
        );
        return Ok(());
    }

    if let Some(instance) = &observation.instance {
        println!("インスタンス: {} ({})", instance.id.cyan(), instance.state);
    }
    print_plan(&observation.plan);
    println!();
    if observation.up_to_date {
        println!("{}", "✓ 差分はありません".green().bold());
    } else {
        println!("{}", observation.plan.to_string().yellow().bold());
    }

    Ok(())
}
