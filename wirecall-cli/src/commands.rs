//! Command execution.

use crate::Commands;
use colored::Colorize;
use serde_json::Value;
use wirecall_client::ClientProxy;

/// Executes a command and returns the formatted output.
pub async fn execute(
    proxy: &ClientProxy,
    cmd: Commands,
) -> Result<String, Box<dyn std::error::Error>> {
    match cmd {
        Commands::Call {
            service,
            method,
            args,
        } => {
            let args = args
                .iter()
                .map(|arg| parse_arg(arg))
                .collect::<Result<Vec<_>, _>>()?;
            let result = proxy.call(&service, &method, args).await?;
            Ok(format_json(&result))
        }

        Commands::Ping { service } => {
            let rtt = proxy.ping(&service).await?;
            Ok(format!(
                "{} from {} in {:.2?}",
                "PONG".green(),
                service.cyan(),
                rtt
            ))
        }
    }
}

/// Parses one positional argument.
fn parse_arg(arg: &str) -> Result<Value, Box<dyn std::error::Error>> {
    if let Some(path) = arg.strip_prefix('@') {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    } else {
        Ok(serde_json::from_str(arg).unwrap_or_else(|_| Value::String(arg.to_string())))
    }
}

/// Formats JSON for display.
fn format_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
