use clap::Parser;

use workspace_initializer::cli::InitializerOpt;

fn main() -> anyhow::Result<()> {
    fluvio_future::subscriber::init_tracer(None);

    let opt = InitializerOpt::parse();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(opt.process())
}
