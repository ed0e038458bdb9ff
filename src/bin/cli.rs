//! relgraph CLI 工具
//!
//! 单条/批量转换、目录查看与交互式转换

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;
use relgraph::cli::{
    execute_console_command, is_console_command, load_catalog, split_statements, CatalogSource,
    CommandResult, ConsoleState, PrintMode, Printer, SqlCompleter,
};
use relgraph::{Converter, ConverterConfig};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "relgraph-cli")]
#[command(about = "relgraph 命令行工具：SQL → SPARQL")]
#[command(version)]
struct Args {
    /// 三元组数据文件（.nt / .csv / .jsonl），从中推断目录
    #[arg(short, long, global = true)]
    data: Option<PathBuf>,

    /// 已保存的推断目录（JSON）
    #[arg(short, long, global = true)]
    catalog: Option<PathBuf>,

    /// 数据集映射目录（JSON）
    #[arg(short, long, global = true)]
    mapping: Option<PathBuf>,

    /// 转换配置文件（JSON）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 严格模式：未知表/列/函数报错
    #[arg(long, global = true)]
    strict: bool,

    /// 不输出 PREFIX 声明
    #[arg(long, global = true)]
    no_prefixes: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 转换单条语句，或文件中以 ; 分隔的多条语句
    Convert {
        /// SQL 语句
        query: Option<String>,

        /// SQL 脚本文件
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// 显示目录，或把推断结果写成 JSON
    Schema {
        /// 输出 JSON 文件（需要 --data）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 垂直显示
        #[arg(long)]
        vertical: bool,
    },
    /// 交互式转换
    Repl,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let converter = build_converter(&args)?;

    match args.command {
        Some(Command::Convert { query, file }) => convert(&converter, query, file),
        Some(Command::Schema { output, vertical }) => schema(&args.data, &converter, output, vertical),
        Some(Command::Repl) | None => repl(converter),
    }
}

fn build_converter(args: &Args) -> anyhow::Result<Converter> {
    let mut config = match &args.config {
        Some(path) => ConverterConfig::from_file(path)
            .with_context(|| format!("加载配置失败: {}", path.display()))?,
        None => ConverterConfig::default(),
    };
    config.strict |= args.strict;
    if args.no_prefixes {
        config.emit_prefixes = false;
    }
    config.validate()?;

    let source = match (&args.data, &args.catalog, &args.mapping) {
        (Some(path), None, None) => CatalogSource::Data(path),
        (None, Some(path), None) => CatalogSource::Inferred(path),
        (None, None, Some(path)) => CatalogSource::Mapping(path),
        (None, None, None) => CatalogSource::None,
        _ => bail!("--data、--catalog、--mapping 只能指定一个"),
    };
    let catalog = load_catalog(source).context("加载目录失败")?;
    Ok(Converter::with_config(catalog, config))
}

fn convert(converter: &Converter, query: Option<String>, file: Option<PathBuf>) -> anyhow::Result<()> {
    let script = match (query, file) {
        (Some(q), None) => q,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("读取脚本失败: {}", path.display()))?,
        _ => bail!("需要且只能指定 <QUERY> 或 --file 之一"),
    };
    let statements = split_statements(&script);
    if statements.is_empty() {
        bail!("没有可转换的语句");
    }

    let results: Vec<_> = statements
        .par_iter()
        .map(|sql| converter.convert(sql))
        .collect();

    let mut failed = 0;
    for (i, (sql, result)) in statements.iter().zip(results).enumerate() {
        if statements.len() > 1 {
            println!("{}", format!("-- [{}] {}", i + 1, sql).dimmed());
        }
        match result {
            Ok(sparql) => println!("{}\n", sparql),
            Err(e) => {
                failed += 1;
                eprintln!("{} {}\n", "错误:".red().bold(), e);
            }
        }
    }
    if failed > 0 {
        bail!("{}/{} 条语句转换失败", failed, statements.len());
    }
    Ok(())
}

fn schema(
    data: &Option<PathBuf>,
    converter: &Converter,
    output: Option<PathBuf>,
    vertical: bool,
) -> anyhow::Result<()> {
    if let Some(output) = output {
        let data = data.as_ref().context("--output 需要 --data")?;
        let catalog = relgraph::cli::infer_from_file(data)?;
        catalog.save(&output)?;
        println!("目录已写入 {}", output.display());
        return Ok(());
    }
    let mode = if vertical { PrintMode::Vertical } else { PrintMode::Table };
    print!("{}", Printer::new(mode).print_schema(converter.catalog()));
    Ok(())
}

fn repl(converter: Converter) -> anyhow::Result<()> {
    println!("relgraph CLI - SQL → SPARQL");
    println!("===========================");
    println!("输入 :help 查看帮助，:quit 退出\n");

    let completer = SqlCompleter::new(converter.catalog().table_names());
    let mut rl: Editor<SqlCompleter, DefaultHistory> = Editor::new()?;
    rl.set_helper(Some(completer));

    let history = dirs::data_dir().map(|d| d.join("relgraph").join("history.txt"));
    if let Some(path) = &history {
        let _ = rl.load_history(path);
    }

    let mut state = ConsoleState::new(converter);
    let mut buffer = String::new();
    loop {
        let prompt = if buffer.is_empty() { "relgraph> " } else { "      -> " };
        let line = match rl.readline(prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                buffer.clear();
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if buffer.is_empty() && is_console_command(trimmed) {
            let _ = rl.add_history_entry(trimmed);
            match execute_console_command(trimmed, &mut state) {
                CommandResult::Exit => break,
                CommandResult::Continue => {}
                CommandResult::Message(msg) => state.write_output(&format!("{}\n", msg)),
                CommandResult::Error(msg) => eprintln!("{} {}", "错误:".red().bold(), msg),
            }
            continue;
        }

        buffer.push_str(trimmed);
        buffer.push('\n');
        if !trimmed.ends_with(';') {
            continue;
        }
        let _ = rl.add_history_entry(buffer.trim());

        for sql in split_statements(&buffer) {
            let start = Instant::now();
            match state.converter.convert(&sql) {
                Ok(sparql) => {
                    let elapsed = start.elapsed().as_millis() as u64;
                    let text = Printer::default().print_conversion(&sparql, elapsed);
                    state.write_output(&text);
                }
                Err(e) => eprintln!("{} {}", "错误:".red().bold(), e),
            }
        }
        buffer.clear();
    }

    if let Some(path) = &history {
        if let Some(dir) = path.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        let _ = rl.save_history(path);
    }
    println!("再见！");
    Ok(())
}
