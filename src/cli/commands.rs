//! 控制台命令处理
//!
//! 处理以 : 开头的控制台命令

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use super::printer::{check_vertical_display, PrintMode, Printer};
use crate::config::ConverterConfig;
use crate::convert::Converter;
use crate::metrics::global_metrics;

/// 控制台命令执行结果
#[derive(Debug, PartialEq)]
pub enum CommandResult {
    /// 继续运行
    Continue,
    /// 退出程序
    Exit,
    /// 显示消息
    Message(String),
    /// 错误
    Error(String),
}

/// 控制台状态
pub struct ConsoleState {
    pub converter: Converter,
    /// 输出到文件
    pub tee_file: Option<File>,
}

impl ConsoleState {
    pub fn new(converter: Converter) -> Self {
        Self {
            converter,
            tee_file: None,
        }
    }

    /// 写入输出（同时写入 stdout 和 tee 文件）
    pub fn write_output(&mut self, content: &str) {
        print!("{}", content);
        if let Some(ref mut file) = self.tee_file {
            let _ = file.write_all(content.as_bytes());
        }
    }

    fn update_config(&mut self, f: impl FnOnce(&mut ConverterConfig)) {
        let mut config = self.converter.config().clone();
        f(&mut config);
        self.converter = self.converter.reconfigure(config);
    }
}

fn parse_switch(arg: &str) -> Option<bool> {
    match arg.trim().to_lowercase().as_str() {
        "on" | "true" | "1" => Some(true),
        "off" | "false" | "0" => Some(false),
        _ => None,
    }
}

/// 解析并执行控制台命令
pub fn execute_console_command(input: &str, state: &mut ConsoleState) -> CommandResult {
    let (input, vertical) = check_vertical_display(input);
    let cmd_line = input.strip_prefix(':').unwrap_or(&input);

    let parts: Vec<&str> = cmd_line.splitn(2, ' ').collect();
    let cmd = parts[0].to_lowercase();
    let args = parts.get(1).copied().unwrap_or("").trim();

    match cmd.as_str() {
        "help" | "h" => CommandResult::Message(Printer::print_help()),

        "quit" | "q" | "exit" | "e" => CommandResult::Exit,

        "tables" | "schema" => {
            let mode = if vertical { PrintMode::Vertical } else { PrintMode::Table };
            CommandResult::Message(Printer::new(mode).print_schema(state.converter.catalog()))
        }

        "strict" => match parse_switch(args) {
            Some(on) => {
                state.update_config(|c| c.strict = on);
                CommandResult::Message(format!("Strict mode {}", if on { "on" } else { "off" }))
            }
            None => CommandResult::Error("Usage: :strict on|off".to_string()),
        },

        "prefixes" => match parse_switch(args) {
            Some(on) => {
                state.update_config(|c| c.emit_prefixes = on);
                CommandResult::Message(format!("Prefix header {}", if on { "on" } else { "off" }))
            }
            None => CommandResult::Error("Usage: :prefixes on|off".to_string()),
        },

        "stats" => CommandResult::Message(Printer::default().print_stats(&global_metrics().snapshot())),

        "tee" => {
            let args_parts: Vec<&str> = args.split_whitespace().collect();
            let (overwrite, filename) = if args_parts.first() == Some(&"-o") {
                (true, args_parts.get(1).copied())
            } else {
                (false, args_parts.first().copied())
            };

            if let Some(filename) = filename {
                let path = PathBuf::from(filename);
                let file = if overwrite {
                    File::create(&path)
                } else {
                    File::options().create(true).append(true).open(&path)
                };

                match file {
                    Ok(f) => {
                        state.tee_file = Some(f);
                        CommandResult::Message(format!("Logging to {}", filename))
                    }
                    Err(e) => CommandResult::Error(format!("Cannot open file: {}", e)),
                }
            } else {
                CommandResult::Error("Usage: :tee [-o] <filename>".to_string())
            }
        }

        "notee" => {
            if state.tee_file.take().is_some() {
                CommandResult::Message("Stopped logging".to_string())
            } else {
                CommandResult::Message("No active logging".to_string())
            }
        }

        "clear" => {
            print!("\x1B[2J\x1B[1;1H");
            CommandResult::Continue
        }

        _ => CommandResult::Error(format!("Unknown command: {}. Type :help for help.", cmd)),
    }
}

/// 检查输入是否是控制台命令
pub fn is_console_command(input: &str) -> bool {
    input.trim().starts_with(':')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::EmptyCatalog;
    use std::sync::Arc;

    fn state() -> ConsoleState {
        ConsoleState::new(Converter::new(Arc::new(EmptyCatalog)))
    }

    #[test]
    fn test_switches_rebuild_converter() {
        let mut state = state();
        assert!(!state.converter.config().strict);
        assert_eq!(
            execute_console_command(":strict on", &mut state),
            CommandResult::Message("Strict mode on".to_string())
        );
        assert!(state.converter.config().strict);

        execute_console_command(":prefixes on", &mut state);
        let out = state.converter.convert("SELECT subject FROM client");
        // 严格模式 + 空目录
        assert!(out.is_err());

        execute_console_command(":strict off", &mut state);
        let out = state.converter.convert("SELECT subject FROM client").unwrap();
        assert!(out.starts_with("PREFIX rdf:"));
    }

    #[test]
    fn test_usage_errors_and_exit() {
        let mut state = state();
        match execute_console_command(":strict maybe", &mut state) {
            CommandResult::Error(msg) => assert!(msg.starts_with("Usage")),
            other => panic!("Expected usage error, got {:?}", other),
        }
        assert_eq!(execute_console_command(":q", &mut state), CommandResult::Exit);
        assert!(matches!(
            execute_console_command(":bogus", &mut state),
            CommandResult::Error(_)
        ));
        assert!(is_console_command("  :tables"));
        assert!(!is_console_command("SELECT 1"));
    }

    #[test]
    fn test_tee_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");
        let mut state = state();
        let cmd = format!(":tee -o {}", path.display());
        assert!(matches!(
            execute_console_command(&cmd, &mut state),
            CommandResult::Message(_)
        ));
        state.write_output("hello\n");
        execute_console_command(":notee", &mut state);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello\n");
    }
}
