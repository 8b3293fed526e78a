use std::time::Duration;

use anyhow::{anyhow, Result};
use input_replay::{ClickOptions, TypeOptions};
use tracing::info;

use super::commands::{ClickArgs, MoveArgs, PressArgs, SelectorArgs, TypeArgs};
use super::context::CliContext;
use crate::element::ElementHandle;
use crate::page::Page;

async fn require_element(page: &Page, ctx: &CliContext, selector: &str) -> Result<ElementHandle> {
    page.wait_for_selector(selector, ctx.config().wait_options())
        .await?
        .ok_or_else(|| anyhow!("No element matches {selector}"))
}

pub async fn cmd_click(args: ClickArgs, ctx: &CliContext) -> Result<()> {
    let page = ctx.page().await?;
    let element = require_element(page, ctx, &args.selector).await?;
    let options = ClickOptions {
        button: args.button,
        click_count: args.count,
        delay: args.delay_ms.map(Duration::from_millis),
    };
    element.click(options).await?;
    info!(selector = %args.selector, button = %args.button, count = args.count, "clicked");
    element.dispose().await?;
    Ok(())
}

pub async fn cmd_tap(args: SelectorArgs, ctx: &CliContext) -> Result<()> {
    let page = ctx.page().await?;
    let element = require_element(page, ctx, &args.selector).await?;
    element.tap().await?;
    info!(selector = %args.selector, "tapped");
    element.dispose().await?;
    Ok(())
}

pub async fn cmd_type(args: TypeArgs, ctx: &CliContext) -> Result<()> {
    let page = ctx.page().await?;
    let element = require_element(page, ctx, &args.selector).await?;
    let delay = args
        .delay_ms
        .map(Duration::from_millis)
        .or_else(|| ctx.config().type_delay());
    element.type_text(&args.text, TypeOptions { delay }).await?;
    info!(selector = %args.selector, chars = args.text.chars().count(), "typed");
    element.dispose().await?;
    Ok(())
}

pub async fn cmd_press(args: PressArgs, ctx: &CliContext) -> Result<()> {
    let page = ctx.page().await?;
    let delay = args.delay_ms.map(Duration::from_millis);
    match &args.selector {
        Some(selector) => {
            let element = require_element(page, ctx, selector).await?;
            element.press(&args.key, delay).await?;
            element.dispose().await?;
        }
        None => page.keyboard().press(&args.key, delay).await?,
    }
    info!(key = %args.key, "pressed");
    Ok(())
}

pub async fn cmd_move(args: MoveArgs, ctx: &CliContext) -> Result<()> {
    let page = ctx.page().await?;
    page.mouse().move_to(args.x, args.y, args.steps).await?;
    let position = page.mouse().position();
    println!("mouse at x={} y={}", position.x, position.y);
    Ok(())
}
