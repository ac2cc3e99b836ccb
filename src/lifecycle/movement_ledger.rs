// src/lifecycle/movement_ledger.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::{
    lifecycle::{space_allocator, LifecycleError},
    models::{
        contract::{Contract, ContractState},
        product::{Movement, MovementKind, NewProduct, Product, ProductState},
        warehouse::Space,
    },
};

pub const INTAKE_DETAIL: &str = "Ingreso de producto al espacio";
pub const WITHDRAW_DETAIL: &str = "Retiro del producto";

/// Movimento ainda não gravado; o id do produto é preenchido pelo repositório.
#[derive(Debug, Clone, PartialEq)]
pub struct MovementDraft {
    pub space_id: i64,
    pub staff_id: i64,
    pub kind: MovementKind,
    pub area: Decimal,
    pub detail: String,
    pub occurred_at: DateTime<Utc>,
}

/// Entrada de produto: exige contrato ATIVO ligando o cliente ao espaço.
pub fn intake(
    space: &mut Space,
    contract: Option<&Contract>,
    product: &NewProduct,
    staff_id: i64,
    at: DateTime<Utc>,
) -> Result<MovementDraft, LifecycleError> {
    let authorized = contract.is_some_and(|c| {
        c.state == ContractState::Active
            && c.space_id == space.id
            && c.client_id == product.client_id
            && space.contract_id == Some(c.id)
    });
    if !authorized {
        return Err(LifecycleError::ContractNotSignedByClient);
    }

    space_allocator::try_reserve(space, product.area, product.height)?;

    Ok(MovementDraft {
        space_id: space.id,
        staff_id,
        kind: MovementKind::Ingreso,
        area: product.area,
        detail: INTAKE_DETAIL.to_string(),
        occurred_at: at,
    })
}

/// Retirada de produto guardado; a área volta para o espaço.
pub fn withdraw(
    space: &mut Space,
    product: &mut Product,
    staff_id: i64,
    at: DateTime<Utc>,
) -> Result<MovementDraft, LifecycleError> {
    if product.state != ProductState::InWarehouse || product.space_id != space.id {
        return Err(LifecycleError::ProductNotInWarehouse(product.id));
    }

    space_allocator::release(space, product.area);
    product.state = ProductState::Withdrawn;

    Ok(MovementDraft {
        space_id: space.id,
        staff_id,
        kind: MovementKind::Retiro,
        area: product.area,
        detail: WITHDRAW_DETAIL.to_string(),
        occurred_at: at,
    })
}

/// Reconstrói a área livre de um espaço a partir do seu histórico.
pub fn replay<'a, I>(total_area: Decimal, movements: I) -> Decimal
where
    I: IntoIterator<Item = &'a Movement>,
{
    movements
        .into_iter()
        .fold(total_area, |available, m| match m.kind {
            MovementKind::Ingreso => available - m.area,
            MovementKind::Retiro => available + m.area,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{product::ProductKind, warehouse::SpaceState};

    fn make_space() -> Space {
        Space {
            id: 3,
            warehouse_id: 1,
            total_area: Decimal::from(50),
            available_area: Decimal::from(50),
            height: Decimal::from(4),
            state: SpaceState::Free,
            contract_id: None,
            created_at: Utc::now(),
        }
    }

    fn make_contract(space: &mut Space, state: ContractState) -> Contract {
        space_allocator::bind(space, 11).unwrap();
        if state == ContractState::Active {
            space_allocator::try_reserve(space, Decimal::ZERO, Decimal::ZERO).unwrap();
        }
        Contract {
            id: 11,
            space_id: space.id,
            client_id: 100,
            agent_id: 200,
            start_date: chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            end_date: chrono::NaiveDate::from_ymd_opt(2026, 12, 31).unwrap(),
            value: Decimal::from(1000),
            description: String::new(),
            state,
            client_signed_at: None,
            agent_signed_at: None,
            closed_at: None,
            created_at: Utc::now(),
        }
    }

    fn new_product(area: i64) -> NewProduct {
        NewProduct {
            client_id: 100,
            name: "Caja".into(),
            description: String::new(),
            area: Decimal::from(area),
            height: Decimal::ONE,
            kind: ProductKind::NonFragile,
        }
    }

    // Simula o que o repositório faz com o rascunho
    fn store(id: i64, space: &Space, draft: &NewProduct) -> Product {
        Product {
            id,
            client_id: draft.client_id,
            space_id: space.id,
            name: draft.name.clone(),
            description: draft.description.clone(),
            area: draft.area,
            height: draft.height,
            kind: draft.kind,
            state: ProductState::InWarehouse,
            created_at: Utc::now(),
        }
    }

    fn record(id: i64, product_id: i64, draft: MovementDraft) -> Movement {
        Movement {
            id,
            product_id,
            space_id: draft.space_id,
            staff_id: draft.staff_id,
            kind: draft.kind,
            area: draft.area,
            detail: draft.detail,
            occurred_at: draft.occurred_at,
        }
    }

    // ── entrada ─────────────────────────────────────────────────────

    #[test]
    fn test_intake_requires_active_contract() {
        let mut space = make_space();
        let contract = make_contract(&mut space, ContractState::PendingVerification);
        let err = intake(&mut space, Some(&contract), &new_product(5), 7, Utc::now()).unwrap_err();
        assert_eq!(err, LifecycleError::ContractNotSignedByClient);
        assert_eq!(space.available_area, Decimal::from(50));

        let err = intake(&mut space, None, &new_product(5), 7, Utc::now()).unwrap_err();
        assert_eq!(err, LifecycleError::ContractNotSignedByClient);
    }

    #[test]
    fn test_intake_rejects_other_clients_products() {
        let mut space = make_space();
        let contract = make_contract(&mut space, ContractState::Active);
        let mut product = new_product(5);
        product.client_id = 999;
        assert!(intake(&mut space, Some(&contract), &product, 7, Utc::now()).is_err());
    }

    #[test]
    fn test_intake_reserves_and_records_ingreso() {
        let mut space = make_space();
        let contract = make_contract(&mut space, ContractState::Active);
        let draft = intake(&mut space, Some(&contract), &new_product(20), 7, Utc::now()).unwrap();
        assert_eq!(draft.kind, MovementKind::Ingreso);
        assert_eq!(draft.area, Decimal::from(20));
        assert_eq!(draft.detail, INTAKE_DETAIL);
        assert_eq!(space.available_area, Decimal::from(30));
    }

    #[test]
    fn test_intake_over_capacity_leaves_space_untouched() {
        let mut space = make_space();
        let contract = make_contract(&mut space, ContractState::Active);
        let err = intake(&mut space, Some(&contract), &new_product(51), 7, Utc::now()).unwrap_err();
        assert!(matches!(err, LifecycleError::CapacityExceeded { .. }));
        assert_eq!(space.available_area, Decimal::from(50));
    }

    // ── retirada ────────────────────────────────────────────────────

    #[test]
    fn test_intake_then_withdraw_restores_area() {
        let mut space = make_space();
        let contract = make_contract(&mut space, ContractState::Active);
        let before = space.available_area;

        let draft = new_product(12);
        intake(&mut space, Some(&contract), &draft, 7, Utc::now()).unwrap();
        let mut product = store(1, &space, &draft);
        let out = withdraw(&mut space, &mut product, 7, Utc::now()).unwrap();

        assert_eq!(out.kind, MovementKind::Retiro);
        assert_eq!(product.state, ProductState::Withdrawn);
        assert_eq!(space.available_area, before);
    }

    #[test]
    fn test_withdraw_twice_fails_without_touching_space() {
        let mut space = make_space();
        let contract = make_contract(&mut space, ContractState::Active);
        let draft = new_product(10);
        intake(&mut space, Some(&contract), &draft, 7, Utc::now()).unwrap();
        let mut product = store(1, &space, &draft);
        withdraw(&mut space, &mut product, 7, Utc::now()).unwrap();
        let after_first = space.available_area;

        let err = withdraw(&mut space, &mut product, 7, Utc::now()).unwrap_err();
        assert_eq!(err, LifecycleError::ProductNotInWarehouse(1));
        assert_eq!(space.available_area, after_first);
    }

    // ── livro ───────────────────────────────────────────────────────

    #[test]
    fn test_replay_matches_cached_area_and_stored_products() {
        let mut space = make_space();
        let contract = make_contract(&mut space, ContractState::Active);
        let mut ledger = Vec::new();
        let mut products = Vec::new();

        for (i, area) in [10, 5, 20].into_iter().enumerate() {
            let draft = new_product(area);
            let mv = intake(&mut space, Some(&contract), &draft, 7, Utc::now()).unwrap();
            let id = i as i64 + 1;
            products.push(store(id, &space, &draft));
            ledger.push(record(id, id, mv));
        }
        let mv = withdraw(&mut space, &mut products[1], 7, Utc::now()).unwrap();
        ledger.push(record(4, 2, mv));

        assert_eq!(replay(space.total_area, &ledger), space.available_area);

        let stored: Decimal = products
            .iter()
            .filter(|p| p.state == ProductState::InWarehouse)
            .map(|p| p.area)
            .sum();
        assert_eq!(space.total_area - space.available_area, stored);
    }

    #[test]
    fn test_replay_of_empty_ledger_is_total() {
        assert_eq!(replay(Decimal::from(8), &Vec::<Movement>::new()), Decimal::from(8));
    }
}
