//! Tipos de erro para o cliente da API ShipIt.
//!
//! Define [`TrackingError`] com variantes para formatos de rastreio
//! desconhecidos, respostas malformadas, erros HTTP e falhas de rede.
//! Todas as variantes são tratadas pelo job como falhas por registro:
//! o registro é ignorado e a execução continua.

use thiserror::Error;

/// Erros que podem ocorrer ao consultar o status de uma remessa.
#[derive(Debug, Error)]
pub enum TrackingError {
    /// O número de rastreio não corresponde a nenhuma transportadora conhecida.
    #[error("unknown tracking number format: {0}")]
    UnknownCarrierFormat(String),

    /// A resposta da API não contém as chaves esperadas.
    #[error("cannot parse ShipIt response: {0}")]
    MalformedResponse(String),

    /// A API respondeu com um status HTTP diferente de 2xx.
    #[error("ShipIt API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Falha de rede subjacente (DNS, conexão recusada, timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}
