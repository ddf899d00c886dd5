mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use workday_ics_core::{SPREADSHEET_NAMESPACE, sources::DEFAULT_SHEET_PATH};

#[derive(Parser)]
#[command(name = "workday-ics")]
#[command(about = "Workday课程表导出工具")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 启用详细日志
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// 从注册表导出文件生成ICS文件
    Generate {
        /// 导出文件路径或URL (.xlsx 或 sheet1.xml)
        #[arg(short, long)]
        input: String,

        /// 学期字母 (A, B, C, D, E)
        #[arg(short, long)]
        term: String,

        /// 学期开始日期（格式：YYYY-MM-DD）
        #[arg(short, long)]
        start: String,

        /// 学期结束日期（格式：YYYY-MM-DD）
        #[arg(short, long)]
        end: String,

        /// 上课时间所在的时区
        #[arg(long, default_value = "America/New_York")]
        timezone: String,

        /// 输出文件路径，默认为 "WPI_<学期>_Term.ics"
        #[arg(short, long)]
        output: Option<String>,

        /// 日历名称
        #[arg(long)]
        calendar_name: Option<String>,

        /// 提醒时间（分钟）
        #[arg(long)]
        reminder_minutes: Option<u32>,

        /// 在学期结束日期停止重复
        #[arg(long)]
        until_term_end: bool,

        /// 工作表命名空间
        #[arg(long, default_value = SPREADSHEET_NAMESPACE)]
        namespace: String,

        /// 工作表在 .xlsx 中的路径
        #[arg(long, default_value = DEFAULT_SHEET_PATH)]
        sheet: String,
    },

    /// 列出导出文件中的课程
    Courses {
        /// 导出文件路径或URL
        #[arg(short, long)]
        input: String,

        /// 只显示指定学期的课程
        #[arg(short, long)]
        term: Option<String>,

        /// 以JSON格式输出
        #[arg(long)]
        json: bool,

        /// 工作表在 .xlsx 中的路径
        #[arg(long, default_value = DEFAULT_SHEET_PATH)]
        sheet: String,
    },

    /// 解析单个上课时间串，例如 "M-W-F|9:00 AM - 9:50 AM"
    Pattern {
        /// 上课时间串
        pattern: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 设置日志级别
    let log_level = if cli.verbose { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("workday_ics_cli={0},workday_ics_core={0}", log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Generate {
            input,
            term,
            start,
            end,
            timezone,
            output,
            calendar_name,
            reminder_minutes,
            until_term_end,
            namespace,
            sheet,
        } => {
            commands::generate_command(commands::GenerateParams {
                input,
                term,
                start,
                end,
                timezone,
                output,
                calendar_name,
                reminder_minutes,
                until_term_end,
                namespace,
                sheet,
            })
            .await
        }

        Commands::Courses {
            input,
            term,
            json,
            sheet,
        } => commands::courses_command(input, term, json, sheet).await,

        Commands::Pattern { pattern } => commands::pattern_command(&pattern),
    }
}
