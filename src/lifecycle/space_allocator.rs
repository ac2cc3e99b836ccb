// src/lifecycle/space_allocator.rs
//
// Contabilidade de área de um espaço. Todas as funções operam sobre a linha
// já travada (FOR UPDATE) pelo serviço; nada aqui toca o banco.

use rust_decimal::Decimal;

use crate::{
    lifecycle::LifecycleError,
    models::warehouse::{Space, SpaceState},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub space_id: i64,
    pub area: Decimal,
    pub remaining_area: Decimal,
    pub state: SpaceState,
}

/// Reserva `area` x `height` no espaço.
///
/// Ordem das checagens: espaço inativo, capacidade (área e altura) e por fim
/// espaço lotado. Assim um pedido positivo num espaço cheio sempre cai em
/// `CapacityExceeded`; só a reserva de área zero (ativação de contrato)
/// esbarra em `SpaceNotAvailable`.
pub fn try_reserve(
    space: &mut Space,
    area: Decimal,
    height: Decimal,
) -> Result<Reservation, LifecycleError> {
    if area.is_sign_negative() || height.is_sign_negative() {
        return Err(LifecycleError::InvalidMeasure);
    }
    if space.state == SpaceState::Inactive {
        return Err(LifecycleError::SpaceNotAvailable { space_id: space.id });
    }
    if area > space.available_area || height > space.height {
        return Err(LifecycleError::CapacityExceeded {
            space_id: space.id,
            requested_area: area,
            available_area: space.available_area,
            requested_height: height,
            max_height: space.height,
        });
    }
    if space.state == SpaceState::ContractedFull {
        return Err(LifecycleError::SpaceNotAvailable { space_id: space.id });
    }

    space.available_area -= area;
    space.state = if space.available_area.is_zero() {
        SpaceState::ContractedFull
    } else {
        SpaceState::ContractedAvailable
    };

    Ok(Reservation {
        space_id: space.id,
        area,
        remaining_area: space.available_area,
        state: space.state,
    })
}

/// Devolve `area` ao espaço. Nunca passa de `total_area`.
pub fn release(space: &mut Space, area: Decimal) {
    if space.state == SpaceState::Inactive {
        return;
    }
    space.available_area = (space.available_area + area.abs()).min(space.total_area);
    settle(space);
}

/// Prende o espaço a um contrato recém-aberto.
pub fn bind(space: &mut Space, contract_id: i64) -> Result<(), LifecycleError> {
    if space.state != SpaceState::Free || space.contract_id.is_some() {
        return Err(LifecycleError::SpaceNotAvailable { space_id: space.id });
    }
    space.contract_id = Some(contract_id);
    Ok(())
}

pub fn unbind(space: &mut Space) {
    space.contract_id = None;
    settle(space);
}

/// Desativação lógica: só para espaço livre, sem contrato e vazio.
pub fn deactivate(space: &mut Space) -> Result<(), LifecycleError> {
    if space.contract_id.is_some() || space.available_area != space.total_area {
        return Err(LifecycleError::SpaceInUse(space.id));
    }
    space.state = SpaceState::Inactive;
    Ok(())
}

/// Substitui o cache pela área calculada a partir do livro.
/// Devolve `true` quando havia divergência.
pub fn reconcile(space: &mut Space, ledger_available: Decimal) -> bool {
    let clamped = ledger_available.max(Decimal::ZERO).min(space.total_area);
    if clamped == space.available_area {
        return false;
    }
    space.available_area = clamped;
    settle(space);
    true
}

// Recalcula o estado a partir da área e do contrato.
fn settle(space: &mut Space) {
    if space.state == SpaceState::Inactive {
        return;
    }
    space.state = if space.available_area == space.total_area && space.contract_id.is_none() {
        SpaceState::Free
    } else if space.available_area.is_zero() {
        SpaceState::ContractedFull
    } else if space.available_area == space.total_area && space.state == SpaceState::Free {
        // Contrato ainda pendente: o espaço continua livre até a ativação
        SpaceState::Free
    } else {
        SpaceState::ContractedAvailable
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn make_space(total: i64, height: i64) -> Space {
        Space {
            id: 1,
            warehouse_id: 1,
            total_area: Decimal::from(total),
            available_area: Decimal::from(total),
            height: Decimal::from(height),
            state: SpaceState::Free,
            contract_id: None,
            created_at: Utc::now(),
        }
    }

    fn d(v: i64) -> Decimal {
        Decimal::from(v)
    }

    // ── try_reserve ─────────────────────────────────────────────────

    #[test]
    fn test_reserve_until_full_then_reject() {
        let mut space = make_space(100, 5);

        let r = try_reserve(&mut space, d(40), d(2)).unwrap();
        assert_eq!(r.state, SpaceState::ContractedAvailable);
        assert_eq!(space.available_area, d(60));

        let r = try_reserve(&mut space, d(60), d(2)).unwrap();
        assert_eq!(r.state, SpaceState::ContractedFull);
        assert_eq!(space.available_area, Decimal::ZERO);

        let err = try_reserve(&mut space, d(1), d(1)).unwrap_err();
        assert!(matches!(err, LifecycleError::CapacityExceeded { .. }));
        assert_eq!(space.available_area, Decimal::ZERO);
    }

    #[test]
    fn test_reserve_rejects_taller_products() {
        let mut space = make_space(100, 5);
        let err = try_reserve(&mut space, d(1), d(6)).unwrap_err();
        assert!(matches!(err, LifecycleError::CapacityExceeded { .. }));
        assert_eq!(space.state, SpaceState::Free);
        assert_eq!(space.available_area, d(100));
    }

    #[test]
    fn test_zero_reservation_on_full_space_is_not_available() {
        let mut space = make_space(10, 5);
        try_reserve(&mut space, d(10), d(1)).unwrap();
        let err = try_reserve(&mut space, Decimal::ZERO, Decimal::ZERO).unwrap_err();
        assert_eq!(err, LifecycleError::SpaceNotAvailable { space_id: 1 });
    }

    #[test]
    fn test_inactive_space_rejects_everything() {
        let mut space = make_space(10, 5);
        space.state = SpaceState::Inactive;
        let err = try_reserve(&mut space, d(1), d(1)).unwrap_err();
        assert_eq!(err, LifecycleError::SpaceNotAvailable { space_id: 1 });
    }

    #[test]
    fn test_negative_measures_are_rejected() {
        let mut space = make_space(10, 5);
        assert_eq!(
            try_reserve(&mut space, d(-1), d(1)).unwrap_err(),
            LifecycleError::InvalidMeasure
        );
        assert_eq!(space.available_area, d(10));
    }

    #[test]
    fn test_zero_reservation_marks_free_space_as_contracted() {
        let mut space = make_space(10, 5);
        bind(&mut space, 9).unwrap();
        let r = try_reserve(&mut space, Decimal::ZERO, Decimal::ZERO).unwrap();
        assert_eq!(r.state, SpaceState::ContractedAvailable);
        assert_eq!(space.available_area, d(10));
    }

    // ── release ─────────────────────────────────────────────────────

    #[test]
    fn test_release_reopens_full_space() {
        let mut space = make_space(10, 5);
        bind(&mut space, 3).unwrap();
        try_reserve(&mut space, d(10), d(1)).unwrap();
        release(&mut space, d(4));
        assert_eq!(space.state, SpaceState::ContractedAvailable);
        assert_eq!(space.available_area, d(4));
    }

    #[test]
    fn test_release_never_exceeds_total() {
        let mut space = make_space(10, 5);
        bind(&mut space, 3).unwrap();
        try_reserve(&mut space, d(2), d(1)).unwrap();
        release(&mut space, d(50));
        assert_eq!(space.available_area, d(10));
        // Contrato ainda segura o espaço
        assert_eq!(space.state, SpaceState::ContractedAvailable);
    }

    #[test]
    fn test_space_is_free_again_after_unbind_when_empty() {
        let mut space = make_space(10, 5);
        bind(&mut space, 3).unwrap();
        try_reserve(&mut space, d(3), d(1)).unwrap();
        release(&mut space, d(3));
        unbind(&mut space);
        assert_eq!(space.state, SpaceState::Free);
        assert_eq!(space.contract_id, None);
    }

    // ── bind / deactivate / reconcile ───────────────────────────────

    #[test]
    fn test_bind_rejects_second_contract() {
        let mut space = make_space(10, 5);
        bind(&mut space, 1).unwrap();
        assert_eq!(
            bind(&mut space, 2).unwrap_err(),
            LifecycleError::SpaceNotAvailable { space_id: 1 }
        );
        assert_eq!(space.contract_id, Some(1));
    }

    #[test]
    fn test_pending_bound_space_stays_free() {
        let mut space = make_space(10, 5);
        bind(&mut space, 1).unwrap();
        assert_eq!(space.state, SpaceState::Free);
        unbind(&mut space);
        assert_eq!(space.state, SpaceState::Free);
    }

    #[test]
    fn test_deactivate_requires_empty_unbound_space() {
        let mut space = make_space(10, 5);
        bind(&mut space, 1).unwrap();
        assert_eq!(deactivate(&mut space).unwrap_err(), LifecycleError::SpaceInUse(1));
        unbind(&mut space);
        deactivate(&mut space).unwrap();
        assert_eq!(space.state, SpaceState::Inactive);
    }

    #[test]
    fn test_reconcile_repairs_drift() {
        let mut space = make_space(10, 5);
        bind(&mut space, 1).unwrap();
        try_reserve(&mut space, d(4), d(1)).unwrap();
        assert!(!reconcile(&mut space, d(6)));
        assert!(reconcile(&mut space, Decimal::ZERO));
        assert_eq!(space.state, SpaceState::ContractedFull);
        assert!(reconcile(&mut space, d(15)));
        assert_eq!(space.available_area, d(10));
    }

    #[test]
    fn test_bounds_hold_for_any_sequence() {
        let mut space = make_space(20, 5);
        bind(&mut space, 1).unwrap();
        let ops: [(bool, i64); 8] = [
            (true, 5), (true, 10), (true, 10), (false, 3),
            (true, 8), (false, 40), (true, 20), (true, 1),
        ];
        for (reserve, amount) in ops {
            if reserve {
                let _ = try_reserve(&mut space, d(amount), d(1));
            } else {
                release(&mut space, d(amount));
            }
            assert!(space.available_area >= Decimal::ZERO);
            assert!(space.available_area <= space.total_area);
        }
    }
}
