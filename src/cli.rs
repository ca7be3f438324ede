//! Interface de linha de comando baseada em clap.
//!
//! Sem argumentos, o job lê `data/job_config.json`, executa uma passada e
//! termina. As flags existem apenas para apontar outro arquivo e para
//! aumentar o nível de log.

use std::path::PathBuf;

use clap::Parser;

use crate::config::DEFAULT_CONFIG_PATH;

/// Reconcilia remessas do Airtable com o rastreio da ShipIt.
#[derive(Debug, Parser)]
#[command(name = "shipment-kpi", version, about)]
pub struct Cli {
    /// Caminho do arquivo de configuração do job (JSON ou TOML).
    #[arg(long, short, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, default_value_t = false)]
    pub verbose: bool,
}
