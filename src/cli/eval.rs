use std::time::Duration;

use anyhow::{bail, Result};
use remote_object::JsValue;

use super::commands::{EvalArgs, WaitForArgs};
use super::context::CliContext;

pub async fn cmd_eval(args: EvalArgs, ctx: &CliContext) -> Result<()> {
    let page = ctx.page().await?;
    let value: JsValue = page.evaluate_expression(&args.expression).await?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

pub async fn cmd_wait_for(args: WaitForArgs, ctx: &CliContext) -> Result<()> {
    let page = ctx.page().await?;
    let mut options = ctx.config().wait_options();
    options.visible = args.visible;
    options.hidden = args.hidden;
    if let Some(ms) = args.timeout_ms {
        options.timeout = Duration::from_millis(ms);
    }

    match page.wait_for_selector(&args.selector, options).await? {
        Some(handle) => {
            let bounds = handle.bounding_box().await?;
            handle.dispose().await?;
            match bounds {
                Some(b) => println!(
                    "{} found at x={} y={} width={} height={}",
                    args.selector, b.x, b.y, b.width, b.height
                ),
                None => println!("{} found (no layout box)", args.selector),
            }
        }
        None if args.hidden => println!("{} is hidden", args.selector),
        None => bail!("{} resolved to a non-element value", args.selector),
    }
    Ok(())
}
