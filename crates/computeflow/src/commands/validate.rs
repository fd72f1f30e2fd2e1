use colored::Colorize;
use std::path::Path;

pub fn handle(config: Option<&Path>) -> anyhow::Result<()> {
    println!("{}", "マニフェストを検証中...".blue());

    let manifest = match computeflow_config::load(config) {
        Ok((path, manifest)) => {
            println!("マニフェスト: {}", path.display().to_string().cyan());
            manifest
        }
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ マニフェストエラー".red().bold());
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    };

    let instance = &manifest.instance;
    println!("{}", "✓ マニフェストは正常です！".green().bold());
    println!();
    println!("サマリー:");
    println!("  リージョン: {}", manifest.region);
    println!(
        "  インスタンス: {} ({})",
        instance.name.cyan(),
        manifest.instance_id.as_deref().unwrap_or("Name タグで検索")
    );
    println!("  AMI: {}", instance.image_id);
    println!("  タイプ: {}", instance.instance_type);
    println!("  サブネット: {}", instance.networking.subnet_id);
    println!(
        "  セキュリティグループ: {}個",
        instance.networking.security_group_ids.len()
    );
    println!("  タグ: {}個", instance.tags.len());
    println!("  ボリューム: {}個", instance.storage.len());
    for storage in &instance.storage {
        println!(
            "    - {} ({}, {}GiB)",
            storage.device_name.cyan(),
            storage.kind,
            storage.size
        );
    }

    Ok(())
}
