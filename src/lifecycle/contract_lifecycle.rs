// src/lifecycle/contract_lifecycle.rs
//
// Máquina de estados do contrato:
//
//   PENDING_VERIFICATION --verify--> VERIFIED_BY_CLIENT --activate--> ACTIVE --finalize--> FINALIZED
//            \                               |                          /
//             +------------------------- cancel ----------------------+----> CANCELLED
//
// FINALIZED e CANCELLED são terminais. Cada transição mexe no contrato e no
// espaço que ele segura; o serviço grava os dois na mesma transação.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::{
    lifecycle::{space_allocator, LifecycleError},
    models::{
        contract::{Contract, ContractState, ContractTerms},
        warehouse::{Space, SpaceState},
    },
};

fn ensure_not_terminal(contract: &Contract) -> Result<(), LifecycleError> {
    if contract.state.is_terminal() {
        return Err(LifecycleError::ContractTerminal {
            contract_id: contract.id,
            state: contract.state,
        });
    }
    Ok(())
}

pub fn check_terms(terms: &ContractTerms) -> Result<(), LifecycleError> {
    if terms.start_date > terms.end_date {
        return Err(LifecycleError::InvalidContractDates);
    }
    if terms.value <= Decimal::ZERO {
        return Err(LifecycleError::InvalidContractValue);
    }
    Ok(())
}

/// Pré-condições para abrir um contrato sobre o espaço. O vínculo em si
/// (`space_allocator::bind`) acontece depois do INSERT, quando já existe id.
pub fn ensure_can_open(space: &Space, terms: &ContractTerms) -> Result<(), LifecycleError> {
    check_terms(terms)?;
    if space.state != SpaceState::Free || space.contract_id.is_some() {
        return Err(LifecycleError::SpaceNotAvailable { space_id: space.id });
    }
    Ok(())
}

/// Cliente confirma o contrato. Só vale até a data de início.
pub fn verify(
    contract: &mut Contract,
    today: NaiveDate,
    at: DateTime<Utc>,
) -> Result<(), LifecycleError> {
    ensure_not_terminal(contract)?;
    if contract.state != ContractState::PendingVerification {
        return Err(LifecycleError::ContractNotPending(contract.id));
    }
    if today > contract.start_date {
        return Err(LifecycleError::VerificationExpired(contract.id));
    }
    contract.state = ContractState::VerifiedByClient;
    contract.client_signed_at = Some(at);
    Ok(())
}

/// Agente assina o contrato verificado; o espaço passa a ser ocupado.
pub fn activate(
    contract: &mut Contract,
    space: &mut Space,
    at: DateTime<Utc>,
) -> Result<(), LifecycleError> {
    ensure_not_terminal(contract)?;
    match contract.state {
        ContractState::VerifiedByClient => {}
        ContractState::Active => return Err(LifecycleError::ContractAlreadyActive(contract.id)),
        _ => return Err(LifecycleError::ContractNotSignedByClient),
    }
    if space.contract_id != Some(contract.id) {
        return Err(LifecycleError::SpaceNotAvailable { space_id: space.id });
    }

    space_allocator::try_reserve(space, Decimal::ZERO, Decimal::ZERO)?;

    contract.state = ContractState::Active;
    contract.agent_signed_at = Some(at);
    Ok(())
}

/// Cancela o contrato. Contrato ativo só é cancelado com o espaço vazio
/// de produtos do cliente.
pub fn cancel(
    contract: &mut Contract,
    space: &mut Space,
    stored_products: i64,
    at: DateTime<Utc>,
) -> Result<(), LifecycleError> {
    ensure_not_terminal(contract)?;
    if contract.state == ContractState::Active && stored_products > 0 {
        return Err(LifecycleError::ClientProductsInWarehouse {
            contract_id: contract.id,
            stored: stored_products,
        });
    }
    contract.state = ContractState::Cancelled;
    contract.closed_at = Some(at);
    detach(contract, space);
    Ok(())
}

/// Encerra um contrato ativo (fechamento pelo agente ou vencimento).
pub fn finalize(
    contract: &mut Contract,
    space: &mut Space,
    stored_products: i64,
    at: DateTime<Utc>,
) -> Result<(), LifecycleError> {
    ensure_not_terminal(contract)?;
    if contract.state != ContractState::Active {
        return Err(LifecycleError::ContractNotActive(contract.id));
    }
    if stored_products > 0 {
        return Err(LifecycleError::ClientProductsInWarehouse {
            contract_id: contract.id,
            stored: stored_products,
        });
    }
    contract.state = ContractState::Finalized;
    contract.closed_at = Some(at);
    detach(contract, space);
    Ok(())
}

/// Edição de valor, datas e descrição: só enquanto pendente.
pub fn edit(contract: &mut Contract, terms: ContractTerms) -> Result<(), LifecycleError> {
    ensure_not_terminal(contract)?;
    if contract.state != ContractState::PendingVerification {
        return Err(LifecycleError::ContractInUse(contract.id));
    }
    check_terms(&terms)?;
    contract.start_date = terms.start_date;
    contract.end_date = terms.end_date;
    contract.value = terms.value;
    contract.description = terms.description;
    Ok(())
}

/// Pendente e nunca verificado, com início há mais de um dia.
pub fn is_stale_pending(contract: &Contract, today: NaiveDate) -> bool {
    contract.state == ContractState::PendingVerification
        && contract.client_signed_at.is_none()
        && contract.start_date < today - Duration::days(1)
}

/// Ativo com data final já vencida.
pub fn is_expired(contract: &Contract, today: NaiveDate) -> bool {
    contract.state == ContractState::Active && contract.end_date < today
}

fn detach(contract: &Contract, space: &mut Space) {
    if space.contract_id == Some(contract.id) {
        space_allocator::unbind(space);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn make_space() -> Space {
        Space {
            id: 5,
            warehouse_id: 1,
            total_area: Decimal::from(100),
            available_area: Decimal::from(100),
            height: Decimal::from(5),
            state: SpaceState::Free,
            contract_id: None,
            created_at: Utc::now(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn make_contract(space: &mut Space, state: ContractState) -> Contract {
        space_allocator::bind(space, 42).unwrap();
        Contract {
            id: 42,
            space_id: space.id,
            client_id: 100,
            agent_id: 200,
            start_date: date(2026, 11, 1),
            end_date: date(2027, 10, 31),
            value: Decimal::from(1_500_000),
            description: "Arriendo".into(),
            state,
            client_signed_at: None,
            agent_signed_at: None,
            closed_at: None,
            created_at: Utc::now(),
        }
    }

    fn terms() -> ContractTerms {
        ContractTerms {
            start_date: date(2026, 11, 1),
            end_date: date(2027, 10, 31),
            value: Decimal::from(900),
            description: "Nuevo valor".into(),
        }
    }

    // ── abertura ────────────────────────────────────────────────────

    #[test]
    fn test_open_requires_free_unbound_space() {
        let mut space = make_space();
        ensure_can_open(&space, &terms()).unwrap();
        space_allocator::bind(&mut space, 1).unwrap();
        assert_eq!(
            ensure_can_open(&space, &terms()).unwrap_err(),
            LifecycleError::SpaceNotAvailable { space_id: 5 }
        );
    }

    #[test]
    fn test_open_validates_terms() {
        let space = make_space();
        let mut t = terms();
        t.end_date = date(2026, 10, 1);
        assert_eq!(ensure_can_open(&space, &t).unwrap_err(), LifecycleError::InvalidContractDates);
        let mut t = terms();
        t.value = Decimal::ZERO;
        assert_eq!(ensure_can_open(&space, &t).unwrap_err(), LifecycleError::InvalidContractValue);
    }

    // ── caminho feliz ───────────────────────────────────────────────

    #[test]
    fn test_full_lifecycle_to_finalized() {
        let mut space = make_space();
        let mut contract = make_contract(&mut space, ContractState::PendingVerification);
        let now = Utc::now();

        verify(&mut contract, date(2026, 10, 20), now).unwrap();
        assert_eq!(contract.state, ContractState::VerifiedByClient);
        assert_eq!(space.state, SpaceState::Free);

        activate(&mut contract, &mut space, now).unwrap();
        assert_eq!(contract.state, ContractState::Active);
        assert_eq!(space.state, SpaceState::ContractedAvailable);
        assert_eq!(space.available_area, Decimal::from(100));

        finalize(&mut contract, &mut space, 0, now).unwrap();
        assert_eq!(contract.state, ContractState::Finalized);
        assert_eq!(space.state, SpaceState::Free);
        assert_eq!(space.contract_id, None);
    }

    // ── verificação ─────────────────────────────────────────────────

    #[test]
    fn test_verify_twice_fails() {
        let mut space = make_space();
        let mut contract = make_contract(&mut space, ContractState::PendingVerification);
        verify(&mut contract, date(2026, 10, 20), Utc::now()).unwrap();
        assert_eq!(
            verify(&mut contract, date(2026, 10, 20), Utc::now()).unwrap_err(),
            LifecycleError::ContractNotPending(42)
        );
    }

    #[test]
    fn test_verify_after_start_date_fails() {
        let mut space = make_space();
        let mut contract = make_contract(&mut space, ContractState::PendingVerification);
        assert_eq!(
            verify(&mut contract, date(2026, 11, 2), Utc::now()).unwrap_err(),
            LifecycleError::VerificationExpired(42)
        );
        assert_eq!(contract.state, ContractState::PendingVerification);
        // No próprio dia de início ainda vale
        verify(&mut contract, date(2026, 11, 1), Utc::now()).unwrap();
    }

    // ── ativação ────────────────────────────────────────────────────

    #[test]
    fn test_activate_pending_requires_client_signature() {
        let mut space = make_space();
        let mut contract = make_contract(&mut space, ContractState::PendingVerification);
        assert_eq!(
            activate(&mut contract, &mut space, Utc::now()).unwrap_err(),
            LifecycleError::ContractNotSignedByClient
        );
        assert_eq!(space.state, SpaceState::Free);
    }

    #[test]
    fn test_activate_twice_is_conflict() {
        let mut space = make_space();
        let mut contract = make_contract(&mut space, ContractState::VerifiedByClient);
        activate(&mut contract, &mut space, Utc::now()).unwrap();
        let err = activate(&mut contract, &mut space, Utc::now()).unwrap_err();
        assert_eq!(err, LifecycleError::ContractAlreadyActive(42));
    }

    #[test]
    fn test_activate_requires_space_held_by_contract() {
        let mut space = make_space();
        let mut contract = make_contract(&mut space, ContractState::VerifiedByClient);
        space.contract_id = Some(99);
        assert!(matches!(
            activate(&mut contract, &mut space, Utc::now()).unwrap_err(),
            LifecycleError::SpaceNotAvailable { .. }
        ));
    }

    // ── cancelamento ────────────────────────────────────────────────

    #[test]
    fn test_cancel_pending_then_verify_fails_terminal() {
        let mut space = make_space();
        let mut contract = make_contract(&mut space, ContractState::PendingVerification);
        cancel(&mut contract, &mut space, 0, Utc::now()).unwrap();
        assert_eq!(contract.state, ContractState::Cancelled);
        assert_eq!(space.contract_id, None);
        assert_eq!(space.state, SpaceState::Free);

        let err = verify(&mut contract, date(2026, 10, 20), Utc::now()).unwrap_err();
        assert!(matches!(err, LifecycleError::ContractTerminal { .. }));
    }

    #[test]
    fn test_cancel_active_with_products_is_refused() {
        let mut space = make_space();
        let mut contract = make_contract(&mut space, ContractState::VerifiedByClient);
        activate(&mut contract, &mut space, Utc::now()).unwrap();
        space_allocator::try_reserve(&mut space, Decimal::from(10), Decimal::ONE).unwrap();

        let err = cancel(&mut contract, &mut space, 1, Utc::now()).unwrap_err();
        assert_eq!(
            err,
            LifecycleError::ClientProductsInWarehouse { contract_id: 42, stored: 1 }
        );
        assert_eq!(contract.state, ContractState::Active);
        assert_eq!(space.contract_id, Some(42));
    }

    #[test]
    fn test_cancel_active_empty_frees_space() {
        let mut space = make_space();
        let mut contract = make_contract(&mut space, ContractState::VerifiedByClient);
        activate(&mut contract, &mut space, Utc::now()).unwrap();
        cancel(&mut contract, &mut space, 0, Utc::now()).unwrap();
        assert_eq!(space.state, SpaceState::Free);
        assert!(contract.closed_at.is_some());
    }

    // ── estados terminais ───────────────────────────────────────────

    #[test]
    fn test_terminal_states_accept_no_transition() {
        for terminal in [ContractState::Finalized, ContractState::Cancelled] {
            let mut space = make_space();
            let mut contract = make_contract(&mut space, terminal);
            let now = Utc::now();
            let today = date(2026, 10, 20);

            assert!(verify(&mut contract, today, now).is_err());
            assert!(activate(&mut contract, &mut space, now).is_err());
            assert!(cancel(&mut contract, &mut space, 0, now).is_err());
            assert!(finalize(&mut contract, &mut space, 0, now).is_err());
            assert!(edit(&mut contract, terms()).is_err());
            assert_eq!(contract.state, terminal);
        }
    }

    #[test]
    fn test_finalize_requires_active_and_empty() {
        let mut space = make_space();
        let mut contract = make_contract(&mut space, ContractState::VerifiedByClient);
        assert_eq!(
            finalize(&mut contract, &mut space, 0, Utc::now()).unwrap_err(),
            LifecycleError::ContractNotActive(42)
        );
        activate(&mut contract, &mut space, Utc::now()).unwrap();
        assert!(finalize(&mut contract, &mut space, 2, Utc::now()).is_err());
        assert_eq!(contract.state, ContractState::Active);
    }

    // ── edição / varredura ──────────────────────────────────────────

    #[test]
    fn test_edit_only_while_pending() {
        let mut space = make_space();
        let mut contract = make_contract(&mut space, ContractState::PendingVerification);
        edit(&mut contract, terms()).unwrap();
        assert_eq!(contract.value, Decimal::from(900));

        verify(&mut contract, date(2026, 10, 20), Utc::now()).unwrap();
        assert_eq!(edit(&mut contract, terms()).unwrap_err(), LifecycleError::ContractInUse(42));
    }

    #[test]
    fn test_stale_pending_and_expiry_detection() {
        let mut space = make_space();
        let contract = make_contract(&mut space, ContractState::PendingVerification);
        assert!(!is_stale_pending(&contract, date(2026, 11, 2)));
        assert!(is_stale_pending(&contract, date(2026, 11, 3)));
        assert!(!is_expired(&contract, date(2027, 11, 1)));

        let mut active = contract.clone();
        active.state = ContractState::Active;
        assert!(!is_expired(&active, date(2027, 10, 31)));
        assert!(is_expired(&active, date(2027, 11, 1)));
    }
}
