//! SQL 关键字补全器
//!
//! 基于 rustyline 实现 Tab 补全：关键字、控制台命令，以及 FROM / JOIN / INTO 之后的表名

use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};

/// SQL 关键字列表
const SQL_KEYWORDS: &[&str] = &[
    // 查询
    "SELECT", "DISTINCT", "FROM", "WHERE", "AS", "JOIN", "INNER", "ON",
    "GROUP", "BY", "HAVING", "ORDER", "ASC", "DESC", "LIMIT", "OFFSET",
    // 谓词
    "AND", "OR", "IN", "BETWEEN", "LIKE", "TRUE", "FALSE",
    // 变更
    "INSERT", "INTO", "VALUES", "DELETE",
    // 组合
    "UNION", "INTERSECT", "EXCEPT", "ALL",
    // 聚合与函数
    "COUNT", "SUM", "AVG", "MIN", "MAX", "UPPER", "LOWER", "LENGTH",
    "SUBSTRING", "ABS", "ROUND", "CEIL", "FLOOR", "CONCAT",
];

/// 子关键字映射
fn get_sub_keywords(keyword: &str) -> Option<&'static [&'static str]> {
    match keyword {
        "ORDER" | "GROUP" => Some(&["BY"]),
        "INSERT" => Some(&["INTO"]),
        "DELETE" => Some(&["FROM"]),
        "UNION" => Some(&["ALL", "SELECT"]),
        "INNER" => Some(&["JOIN"]),
        _ => None,
    }
}

/// Keywords followed by a table name
const TABLE_POSITIONS: &[&str] = &["FROM", "JOIN", "INTO"];

/// 控制台命令列表
const CONSOLE_COMMANDS: &[&str] = &[
    ":help", ":h", ":quit", ":q", ":exit", ":tables", ":strict", ":prefixes", ":stats", ":tee",
    ":notee", ":clear",
];

/// relgraph REPL 补全器
#[derive(Default)]
pub struct SqlCompleter {
    tables: Vec<String>,
}

fn pairs<'a>(candidates: impl Iterator<Item = &'a str>) -> Vec<Pair> {
    candidates
        .map(|c| Pair {
            display: c.to_string(),
            replacement: c.to_string(),
        })
        .collect()
}

impl SqlCompleter {
    pub fn new(tables: Vec<String>) -> Self {
        Self { tables }
    }

    /// Candidates for the word ending at `pos`, with the replacement start
    pub fn candidates(&self, line: &str, pos: usize) -> (usize, Vec<Pair>) {
        let line_to_cursor = &line[..pos];

        if line_to_cursor.starts_with(':') {
            let found = CONSOLE_COMMANDS
                .iter()
                .copied()
                .filter(|cmd| cmd.starts_with(line_to_cursor));
            return (0, pairs(found));
        }

        let words: Vec<&str> = line_to_cursor.split_whitespace().collect();
        let at_word_end = !line_to_cursor.ends_with(char::is_whitespace);
        let (current, previous) = match (at_word_end, words.as_slice()) {
            (true, [.., prev, cur]) => (*cur, Some(prev.to_uppercase())),
            (true, [cur]) => (*cur, None),
            (false, [.., prev]) => ("", Some(prev.to_uppercase())),
            _ => return (pos, Vec::new()),
        };
        let start = pos - current.len();
        let upper = current.to_uppercase();

        if let Some(prev) = previous.as_deref() {
            if TABLE_POSITIONS.contains(&prev) {
                let lower = current.to_lowercase();
                let found = self
                    .tables
                    .iter()
                    .map(String::as_str)
                    .filter(|t| t.starts_with(&lower));
                return (start, pairs(found));
            }
            if let Some(subs) = get_sub_keywords(prev) {
                let found: Vec<Pair> = pairs(subs.iter().copied().filter(|kw| kw.starts_with(&upper)));
                if !found.is_empty() || !at_word_end {
                    return (start, found);
                }
            }
        }
        if current.is_empty() {
            return (pos, Vec::new());
        }
        let found = SQL_KEYWORDS.iter().copied().filter(|kw| kw.starts_with(&upper));
        (start, pairs(found))
    }
}

impl Completer for SqlCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        Ok(self.candidates(line, pos))
    }
}

impl Hinter for SqlCompleter {
    type Hint = String;
}

impl Highlighter for SqlCompleter {}

impl Validator for SqlCompleter {}

impl Helper for SqlCompleter {}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete(line: &str) -> (usize, Vec<String>) {
        let completer = SqlCompleter::new(vec!["client".into(), "product".into()]);
        let (start, found) = completer.candidates(line, line.len());
        (start, found.into_iter().map(|p| p.replacement).collect())
    }

    #[test]
    fn test_keyword_completion() {
        assert_eq!(complete("sel"), (0, vec!["SELECT".to_string()]));
        assert_eq!(complete("SELECT name FROM client ORDER "), (30, vec!["BY".to_string()]));
        let (_, found) = complete("SELECT COU");
        assert_eq!(found, vec!["COUNT"]);
    }

    #[test]
    fn test_table_completion() {
        assert_eq!(complete("SELECT * FROM cl"), (14, vec!["client".to_string()]));
        let (_, found) = complete("INSERT INTO ");
        assert_eq!(found, vec!["client", "product"]);
    }

    #[test]
    fn test_console_commands() {
        let (start, found) = complete(":st");
        assert_eq!(start, 0);
        assert_eq!(found, vec![":strict", ":stats"]);
        assert!(complete("").1.is_empty());
    }
}
