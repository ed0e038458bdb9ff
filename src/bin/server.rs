//! relgraph 服务器入口
//!
//! 启动 HTTP 转换服务

use anyhow::{bail, Context};
use clap::Parser;
use relgraph::cli::{load_catalog, CatalogSource};
use relgraph::server::{start_server, ServerConfig};
use relgraph::{Converter, ConverterConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "relgraph-server")]
#[command(about = "relgraph HTTP 转换服务")]
#[command(version)]
struct Args {
    /// 监听地址
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// 监听端口
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// 三元组数据文件，从中推断目录
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// 已保存的推断目录（JSON）
    #[arg(short, long)]
    catalog: Option<PathBuf>,

    /// 数据集映射目录（JSON）
    #[arg(short, long)]
    mapping: Option<PathBuf>,

    /// 转换配置文件（JSON）
    #[arg(long)]
    config: Option<PathBuf>,

    /// 严格模式
    #[arg(long)]
    strict: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    println!("relgraph - SQL → SPARQL 转换服务");
    println!("================================");

    let mut config = match &args.config {
        Some(path) => ConverterConfig::from_file(path)
            .with_context(|| format!("加载配置失败: {}", path.display()))?,
        None => ConverterConfig::default(),
    };
    config.strict |= args.strict;
    config.validate()?;

    let source = match (&args.data, &args.catalog, &args.mapping) {
        (Some(path), None, None) => CatalogSource::Data(path),
        (None, Some(path), None) => CatalogSource::Inferred(path),
        (None, None, Some(path)) => CatalogSource::Mapping(path),
        (None, None, None) => CatalogSource::None,
        _ => bail!("--data、--catalog、--mapping 只能指定一个"),
    };
    let catalog = load_catalog(source).context("加载目录失败")?;

    println!("目录已加载");
    println!("  虚拟表数: {}", catalog.table_names().len());
    println!("  严格模式: {}", config.strict);

    let server_config = ServerConfig {
        host: args.host,
        port: args.port,
    };
    start_server(server_config, Converter::with_config(catalog, config)).await?;

    Ok(())
}
