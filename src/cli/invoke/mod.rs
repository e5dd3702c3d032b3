//! Invoke command - one model call through the configured gateway

use clap::Args;
use tracing::info;

use crate::domain::{AllowedModel, ModelGateway};

/// Arguments for the invoke command
#[derive(Args, Clone, Debug)]
pub struct InvokeArgs {
    /// Model identifier (kimi-k2p5 or kimi-k2-instruct-0905)
    #[arg(long)]
    pub model: String,

    /// Prompt to send
    #[arg(long)]
    pub prompt: String,

    /// Output token cap
    #[arg(long, default_value_t = 400)]
    pub max_tokens: u32,
}

/// Call the model and print its text to stdout
pub async fn run(args: InvokeArgs) -> anyhow::Result<()> {
    let config = super::load_config()?;
    let gateway = crate::create_gateway(&config.gateway)?;

    let text = invoke(gateway.as_ref(), &args).await?;
    println!("{}", text);

    Ok(())
}

async fn invoke(gateway: &dyn ModelGateway, args: &InvokeArgs) -> anyhow::Result<String> {
    let model: AllowedModel = args.model.parse()?;

    let completion = gateway.invoke(model, &args.prompt, args.max_tokens).await?;

    info!(
        model = %model,
        prompt_tokens = completion.usage.prompt_tokens,
        completion_tokens = completion.usage.completion_tokens,
        "Model call finished"
    );

    Ok(completion.text)
}
