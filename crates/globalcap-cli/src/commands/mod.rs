mod run;
mod show;

use std::path::Path;

use globalcap_core::{Warehouse, WarehouseConfig};

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub async fn run(cli: &Cli) -> Result<(), CliError> {
    let warehouse_path = cli.warehouse.as_deref();
    match &cli.command {
        Command::Run(args) => run::run(args, warehouse_path).await,
        Command::Show(args) => show::run(args, warehouse_path),
    }
}

fn open_warehouse(path: Option<&Path>) -> Result<Warehouse, CliError> {
    let config = match path {
        Some(path) => WarehouseConfig::at_path(path),
        None => WarehouseConfig::default(),
    };
    Ok(Warehouse::open(config)?)
}

/// Truncate to `width` characters, marking the cut with `~`.
fn fit(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_owned();
    }
    let mut cut: String = value.chars().take(width.saturating_sub(1)).collect();
    cut.push('~');
    cut
}

#[cfg(test)]
mod tests {
    use super::fit;

    #[test]
    fn long_names_are_cut_to_width() {
        assert_eq!(fit("Acme", 10), "Acme");
        assert_eq!(fit("Taiwan Semiconductor", 10), "Taiwan Se~");
    }
}
