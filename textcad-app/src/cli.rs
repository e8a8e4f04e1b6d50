use std::path::PathBuf;

use clap::Parser;

/// 把自然语言绘图指令转换为 DXF。
#[derive(Parser, Debug)]
#[command(name = "textcad")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// 要处理的指令，可重复；缺省时逐行读取标准输入
    #[arg(long = "cmd", value_name = "TEXT")]
    pub commands: Vec<String>,

    /// 输出 DXF 路径，优先于 `save as` 与配置
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,

    /// 显式指定配置文件
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// 覆盖配置中的文本生成提供方
    #[arg(long, value_name = "NAME")]
    pub provider: Option<String>,

    /// 只用规则与自由文本匹配，不调用生成式兜底
    #[arg(long)]
    pub no_ai: bool,

    /// 不提问，缺失字段使用内置默认回答
    #[arg(long)]
    pub non_interactive: bool,

    /// 强制逐个提问，即使标准输入不是终端；直接回车采用默认值
    #[arg(long = "interactive", conflicts_with = "non_interactive")]
    pub interactive_flag: bool,
}

impl Cli {
    /// 是否在终端提问。
    ///
    /// 指令来自标准输入时不提问；否则 `--interactive` 强制开启，
    /// `--non-interactive` 关闭，两者都未给出时取决于标准输入是否为终端。
    pub fn interactive(&self, commands_from_stdin: bool, stdin_is_terminal: bool) -> bool {
        if commands_from_stdin {
            false
        } else if self.interactive_flag {
            true
        } else if self.non_interactive {
            false
        } else {
            stdin_is_terminal
        }
    }
}
