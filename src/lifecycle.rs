// src/lifecycle.rs
//
// Regras de ocupação de espaços, contratos e movimentos de produtos.
// Funções puras sobre as linhas já carregadas (e travadas) pelos serviços.

pub mod contract_lifecycle;
pub mod error;
pub mod movement_ledger;
pub mod space_allocator;

pub use error::LifecycleError;
