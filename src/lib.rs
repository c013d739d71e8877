//! Ciclo de vida das análises de editais: grafo de status, deduplicação de
//! lançamentos, barramento de eventos e acompanhamento da fila de processamento.

pub mod api;
pub mod config;
pub mod decision;
pub mod error;
pub mod events;
pub mod launcher;
pub mod observers;
pub mod registry;
pub mod status;
pub mod watcher;
