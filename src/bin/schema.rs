//! relgraph 模式推断工具
//!
//! 从三元组文件推断虚拟关系目录

use anyhow::Context;
use clap::Parser;
use relgraph::cli::{infer_from_file, PrintMode, Printer};
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "relgraph-schema")]
#[command(about = "relgraph 模式推断工具")]
#[command(version)]
struct Args {
    /// 输入文件路径（.nt / .csv / .jsonl）
    #[arg(short, long)]
    input: PathBuf,

    /// 输出 JSON 文件，可作为 --catalog 使用
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 垂直显示
    #[arg(long)]
    vertical: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    println!("relgraph 模式推断工具");
    println!("=====================");
    println!("输入文件: {:?}", args.input);

    let start = Instant::now();
    let catalog = infer_from_file(&args.input)
        .with_context(|| format!("推断失败: {}", args.input.display()))?;

    let mode = if args.vertical { PrintMode::Vertical } else { PrintMode::Table };
    print!("{}", Printer::new(mode).print_schema(&catalog));
    println!("耗时: {:.2?}", start.elapsed());

    if let Some(output) = &args.output {
        catalog.save(output)?;
        println!("目录已写入 {}", output.display());
    }

    Ok(())
}
