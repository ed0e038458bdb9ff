//! 结果打印器
//!
//! 目录、转换结果与统计信息的表格 / 垂直格式输出

use crate::metrics::MetricsSnapshot;
use crate::schema::Catalog;
use colored::Colorize;
use prettytable::{format, row, Cell, Row, Table};

/// 打印模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintMode {
    /// 表格模式
    Table,
    /// 垂直模式 (\G)
    Vertical,
}

/// 结果打印器
pub struct Printer {
    mode: PrintMode,
}

impl Default for Printer {
    fn default() -> Self {
        Self::new(PrintMode::Table)
    }
}

impl Printer {
    pub fn new(mode: PrintMode) -> Self {
        Self { mode }
    }

    /// 设置打印模式
    pub fn set_mode(&mut self, mode: PrintMode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> PrintMode {
        self.mode
    }

    /// 打印虚拟表目录
    pub fn print_schema(&self, catalog: &dyn Catalog) -> String {
        let tables = catalog.table_names();
        if tables.is_empty() {
            return "Empty catalog\n".to_string();
        }
        let rows: Vec<Vec<String>> = tables
            .iter()
            .map(|name| {
                vec![
                    name.clone(),
                    catalog
                        .lookup_type(name)
                        .map(|iri| iri.as_str().to_string())
                        .unwrap_or_default(),
                    catalog.columns(name).unwrap_or_default().join(", "),
                ]
            })
            .collect();
        let columns = ["Table", "Type", "Columns"].map(String::from);

        let output = match self.mode {
            PrintMode::Table => self.format_table(&columns, &rows),
            PrintMode::Vertical => self.format_vertical(&columns, &rows),
        };
        format!("{}\n{} table(s)\n", output, rows.len())
    }

    /// 打印一条转换结果
    pub fn print_conversion(&self, sparql: &str, elapsed_ms: u64) -> String {
        format!("{}\n{}\n", sparql, format!("({} ms)", elapsed_ms).dimmed())
    }

    /// 表格格式
    fn format_table(&self, columns: &[String], rows: &[Vec<String>]) -> String {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_BOX_CHARS);

        let header: Vec<Cell> = columns.iter().map(|c| Cell::new(c)).collect();
        table.set_titles(Row::new(header));

        for row_data in rows {
            let cells: Vec<Cell> = row_data.iter().map(|v| Cell::new(v)).collect();
            table.add_row(Row::new(cells));
        }

        table.to_string()
    }

    /// 垂直格式
    fn format_vertical(&self, columns: &[String], rows: &[Vec<String>]) -> String {
        let max_col_width = columns.iter().map(|c| c.len()).max().unwrap_or(0);
        let mut output = String::new();

        for (i, row_data) in rows.iter().enumerate() {
            output.push_str(&format!(
                "*************************** {}. row ***************************\n",
                i + 1
            ));
            for (j, col) in columns.iter().enumerate() {
                let value = row_data.get(j).map(|s| s.as_str()).unwrap_or("");
                output.push_str(&format!("{:>width$}: {}\n", col, value, width = max_col_width));
            }
        }

        output
    }

    /// 打印统计信息
    pub fn print_stats(&self, snapshot: &MetricsSnapshot) -> String {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_BOX_CHARS);
        table.set_titles(row!["Metric", "Value"]);
        table.add_row(row!["Conversions", snapshot.conversions_total.to_string()]);
        table.add_row(row!["Succeeded", snapshot.conversions_succeeded.to_string()]);
        table.add_row(row!["Failed", snapshot.conversions_failed.to_string()]);
        table.add_row(row![
            "Avg duration (ms)",
            format!("{:.3}", snapshot.avg_conversion_duration_ms)
        ]);
        table.add_row(row!["Lenient fallbacks", snapshot.lenient_fallbacks.to_string()]);
        table.add_row(row!["Triples loaded", snapshot.triples_loaded.to_string()]);
        table.to_string()
    }

    /// 打印帮助信息
    pub fn print_help() -> String {
        r#"
═══════════════════════════════════════════════════════════════
                   relgraph 交互式转换
═══════════════════════════════════════════════════════════════

输入以 ; 结尾的 SQL 语句，输出对应的 SPARQL。

支持的语句:
  SELECT name, age FROM client WHERE age >= 18 ORDER BY age DESC LIMIT 10
  SELECT c.name, o.total FROM client c JOIN orders o ON c.id = o.client_id
  SELECT category, COUNT(*) FROM product GROUP BY category HAVING COUNT(*) > 2
  SELECT name FROM client UNION SELECT name FROM supplier
  INSERT INTO client (name, age) VALUES ('Bob', 25)
  DELETE FROM client WHERE age < 18

═══════════════════════════════════════════════════════════════
控制台命令 (以 : 开头)
═══════════════════════════════════════════════════════════════

  :help, :h              显示帮助
  :quit, :q              退出程序
  :tables                列出目录中的虚拟表 (末尾加 \G 垂直显示)
  :strict on|off         严格模式：未知表/列/函数报错
  :prefixes on|off       输出 PREFIX rdf: 声明
  :stats                 显示转换统计
  :tee [-o] <file>       输出到文件 (-o 覆盖)
  :notee                 停止输出到文件
  :clear                 清屏

═══════════════════════════════════════════════════════════════
"#
        .to_string()
    }
}

/// 检查输入是否以 \G 结尾（垂直显示）
pub fn check_vertical_display(input: &str) -> (String, bool) {
    let trimmed = input.trim();
    if trimmed.ends_with("\\G") || trimmed.ends_with("\\g") {
        let clean = trimmed[..trimmed.len() - 2].trim().to_string();
        (clean, true)
    } else {
        (trimmed.to_string(), false)
    }
}
