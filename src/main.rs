//! dupcat CLI: parse arguments, layer `.dupcat.toml`, run the engine, print
//! the report.

use clap::Parser;

use dupcat::config::Opts;
use dupcat::engine::cli::Cli;
use dupcat::{engine, utils};

/// Fill in the CLI-unset `Option` fields of `opts` from the `.dupcat.toml`
/// in the current directory, if one exists. Flag/enum fields are left
/// entirely to the CLI layer, since clap's bool flags can't distinguish
/// "explicitly false" from "not passed" (see `utils::config_file`'s doc
/// comment on the intended two-layer precedence).
fn apply_file_config(opts: &mut Opts) {
    let cwd = match std::env::current_dir() {
        Ok(d) => d,
        Err(_) => return,
    };
    let Some(file) = utils::load_dupcat_toml(&cwd) else {
        return;
    };
    let mut file_opts = Opts::default();
    utils::apply_file_to_opts(&file, &mut file_opts);

    if opts.db_path.is_none() {
        opts.db_path = file_opts.db_path;
    }
    if opts.first_block_size.is_none() {
        opts.first_block_size = file_opts.first_block_size;
    }
    if opts.stats_file.is_none() {
        opts.stats_file = file_opts.stats_file;
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut opts = cli.into_opts()?;
    apply_file_config(&mut opts);

    utils::setup_logging(opts.verbose, opts.quiet);

    let outcome = engine::run(&opts)?;
    engine::report::print(&outcome, &opts);

    Ok(())
}
