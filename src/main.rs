use anyhow::Result;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = start() {
        log::error!("virtual mouse failed: {err:?}");
        return Err(err);
    }
    Ok(())
}

#[cfg(feature = "camera-nokhwa")]
fn start() -> Result<()> {
    virtual_mouse::app::run()
}

#[cfg(not(feature = "camera-nokhwa"))]
fn start() -> Result<()> {
    anyhow::bail!("built without camera support, enable the `camera-nokhwa` feature")
}
