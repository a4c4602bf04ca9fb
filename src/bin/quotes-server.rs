//! MCP server exposing the quote tools over streamable HTTP.

use std::process::ExitCode;

use mcp_http_tools::cli;
use mcp_http_tools::tools::ToolSet;

fn main() -> ExitCode {
    cli::run(ToolSet::Quotes)
}
