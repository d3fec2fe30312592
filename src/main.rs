// ==========================================
// 服装生产进度引擎 - 命令行入口
// ==========================================
// 用法:
//   garment-progress [--db PATH] [--view] recompute <order_id>...
//   garment-progress [--db PATH] [--view] recompute-style <style_no>
//   garment-progress [--db PATH] save-template [--style STYLE] <json_file>
//   garment-progress [--db PATH] logs <order_id>
//   garment-progress [--db PATH] config
// 输出: 快照 JSON 写 stdout，日志写 stderr
// ==========================================

use anyhow::{bail, Context};
use garment_progress::api::AggregatorKind;
use garment_progress::app::{get_default_db_path, AppState};
use garment_progress::domain::types::Operator;
use garment_progress::logging;

const USAGE: &str = "用法: garment-progress [--db PATH] [--view] recompute <order_id>... | recompute-style <style_no> \
| save-template [--style STYLE] <json_file> | logs <order_id> | config";

enum Command {
    Recompute(Vec<String>),
    RecomputeStyle(String),
    SaveTemplate { style_no: Option<String>, file: String },
    Logs(String),
    Config,
}

struct CliArgs {
    db_path: Option<String>,
    kind: AggregatorKind,
    command: Command,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> anyhow::Result<CliArgs> {
    let mut db_path = None;
    let mut kind = AggregatorKind::InMemory;
    let mut style_no = None;
    let mut rest = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--db" => {
                let path = args.next().context("--db 缺少路径参数")?;
                db_path = Some(path);
            }
            "--view" => kind = AggregatorKind::View,
            "--style" => {
                let style = args.next().context("--style 缺少款号")?;
                style_no = Some(style);
            }
            "-h" | "--help" => bail!("{}", USAGE),
            _ => rest.push(arg),
        }
    }

    let mut rest = rest.into_iter();
    let command = match rest.next().as_deref() {
        Some("recompute") => {
            let ids: Vec<String> = rest.filter(|s| !s.trim().is_empty()).collect();
            if ids.is_empty() {
                bail!("recompute 至少需要一个订单ID\n{}", USAGE);
            }
            Command::Recompute(ids)
        }
        Some("recompute-style") => {
            let style = rest.next().context("recompute-style 缺少款号")?;
            Command::RecomputeStyle(style)
        }
        Some("save-template") => {
            let file = rest.next().context("save-template 缺少模板文件路径")?;
            Command::SaveTemplate { style_no, file }
        }
        Some("logs") => {
            let order_id = rest.next().context("logs 缺少订单ID")?;
            Command::Logs(order_id)
        }
        Some("config") => Command::Config,
        Some(other) => bail!("未知命令: {}\n{}", other, USAGE),
        None => bail!("{}", USAGE),
    };

    Ok(CliArgs { db_path, kind, command })
}

fn main() -> anyhow::Result<()> {
    logging::init();

    let cli = parse_args(std::env::args().skip(1))?;
    let db_path = cli.db_path.unwrap_or_else(get_default_db_path);

    tracing::info!("{} v{}", garment_progress::APP_NAME, garment_progress::VERSION);
    tracing::info!("使用数据库: {}", db_path);

    let state = AppState::new(db_path, cli.kind).map_err(anyhow::Error::msg)?;
    let api = state.progress_api.clone();

    match cli.command {
        Command::Recompute(order_ids) => {
            let mut failed = 0usize;
            for order_id in &order_ids {
                match api.recompute(order_id) {
                    Ok(snapshot) => println!("{}", serde_json::to_string(&snapshot)?),
                    Err(e) => {
                        failed += 1;
                        tracing::error!(order_id = %order_id, error = %e, "重算失败");
                    }
                }
            }
            if failed > 0 {
                bail!("{}/{} 个订单重算失败", failed, order_ids.len());
            }
        }
        Command::RecomputeStyle(style_no) => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("无法创建 tokio 运行时")?;
            let count = runtime.block_on(api.recompute_by_style(&style_no))?;
            println!("{}", serde_json::json!({ "style_no": style_no, "recomputed": count }));
        }
        Command::SaveTemplate { style_no, file } => {
            let template_json =
                std::fs::read_to_string(&file).with_context(|| format!("无法读取模板文件: {}", file))?;
            let template_id = api.save_stage_template(style_no.as_deref(), &template_json, &Operator::system())?;
            println!("{}", serde_json::json!({ "style_no": style_no, "template_id": template_id }));
        }
        Command::Logs(order_id) => {
            for log in state.action_log_repo.find_by_order_id(&order_id)? {
                println!("{}", serde_json::to_string(&log)?);
            }
        }
        Command::Config => {
            let entries: std::collections::BTreeMap<_, _> = state.config_manager.get_all()?.into_iter().collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
    }

    Ok(())
}
