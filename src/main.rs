use std::env;

use anyhow::Context;
use learner::{FitOptions, LearnerBuilder, RunConfig};
use log::info;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let path = env::args()
        .nth(1)
        .or_else(|| env::var("CONFIG").ok())
        .context("usage: slowai <config.json>, or set CONFIG")?;

    let config = RunConfig::from_path(&path).with_context(|| format!("loading {path}"))?;
    let mut learn = LearnerBuilder::new().build(&config)?;

    if let Some(lr_find) = config.lr_find {
        let history = learn.lr_find(lr_find.into())?;
        info!("tried {} learning rates", history.len());
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }

    learn.fit(config.epochs, FitOptions::new())?;

    match &learn.state().metrics {
        Some(metrics) => println!("{}", serde_json::to_string_pretty(metrics)?),
        None => info!("fit finished without metrics, add a metrics callback to get some"),
    }

    Ok(())
}
