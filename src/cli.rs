//! Interface de linha de comando do ALICIT baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (analisar,
//! acompanhar, decidir, status) e flags globais (--api-url, --verbose).

use alicit::status::{Action, Status};
use clap::{Parser, Subcommand, ValueEnum};

/// ALICIT: acompanhamento de análises de licitações.
#[derive(Debug, Parser)]
#[command(name = "alicit", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// URL base do backend (sobrescreve alicit.toml e ALICIT_API_URL).
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Ação aceita pela CLI, mapeada para [`Action`] internamente.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ActionArg {
    /// Aprova a licitação para elaboração de proposta.
    Approve,
    /// Recusa a licitação.
    Reject,
    /// Coloca a licitação em análise.
    Analyze,
}

impl From<ActionArg> for Action {
    fn from(arg: ActionArg) -> Self {
        match arg {
            ActionArg::Approve => Action::Approve,
            ActionArg::Reject => Action::Reject,
            ActionArg::Analyze => Action::Analyze,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Inicia a análise de um edital e aguarda o resultado.
    Analisar {
        /// Número de controle PNCP da licitação.
        numero: String,

        /// CNPJ da empresa.
        #[arg(long)]
        cnpj: String,

        /// Status atual da licitação.
        #[arg(long, default_value = "nao_analisado")]
        status: Status,
    },

    /// Acompanha a fila de processamento de uma análise até o fim.
    Acompanhar {
        /// Número de controle PNCP da licitação.
        numero: String,

        /// CNPJ da empresa.
        #[arg(long)]
        cnpj: Option<String>,
    },

    /// Registra uma decisão (aprovar, recusar, analisar) no backend.
    Decidir {
        /// Número de controle PNCP da licitação.
        numero: String,

        /// CNPJ da empresa.
        #[arg(long)]
        cnpj: String,

        /// Status atual da licitação.
        #[arg(long)]
        status: Status,

        /// Ação a aplicar.
        #[arg(long, value_enum)]
        acao: ActionArg,
    },

    /// Mostra as capacidades e próximos status possíveis de um status.
    Status {
        /// Nome do status (ex.: nao_analisado, em_analise).
        status: Status,
    },
}
