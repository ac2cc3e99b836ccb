// src/services/document_service.rs

use genpdf::{elements, style, Element};
use sqlx::PgPool;

use crate::{
    common::error::AppError,
    db::{ContractRepository, UserRepository, WarehouseRepository},
    models::{
        auth::User,
        contract::{Contract, ContractState},
        warehouse::{Space, Warehouse},
    },
    services::contract_service::can_view,
};

fn state_label(state: ContractState) -> &'static str {
    match state {
        ContractState::PendingVerification => "Pendiente de verificación",
        ContractState::VerifiedByClient => "Verificado por el cliente",
        ContractState::Active => "Activo",
        ContractState::Finalized => "Finalizado",
        ContractState::Cancelled => "Cancelado",
    }
}

/// Linhas (rótulo, valor) do quadro principal do contrato.
pub fn contract_rows(
    contract: &Contract,
    space: &Space,
    warehouse: &Warehouse,
    client: &User,
    agent: &User,
) -> Vec<(String, String)> {
    let signed = |at: Option<chrono::DateTime<chrono::Utc>>| {
        at.map(|d| d.format("%d/%m/%Y %H:%M").to_string())
            .unwrap_or_else(|| "Sin firma".to_string())
    };

    vec![
        ("Estado".into(), state_label(contract.state).into()),
        ("Cliente".into(), format!("{} ({})", client.name, client.email)),
        ("Agente de ventas".into(), format!("{} ({})", agent.name, agent.email)),
        ("Bodega".into(), format!("{} - {}, {}", warehouse.name, warehouse.address, warehouse.city)),
        ("Espacio".into(), format!("#{} - {:.2} m² / {:.2} m de altura", space.id, space.total_area, space.height)),
        ("Vigencia".into(), format!(
            "{} a {}",
            contract.start_date.format("%d/%m/%Y"),
            contract.end_date.format("%d/%m/%Y")
        )),
        ("Valor".into(), format!("$ {:.2}", contract.value)),
        ("Firma del cliente".into(), signed(contract.client_signed_at)),
        ("Firma del agente".into(), signed(contract.agent_signed_at)),
    ]
}

#[derive(Clone)]
pub struct DocumentService {
    contract_repo: ContractRepository,
    warehouse_repo: WarehouseRepository,
    user_repo: UserRepository,
    pool: PgPool,
    fonts_dir: String,
}

impl DocumentService {
    pub fn new(
        contract_repo: ContractRepository,
        warehouse_repo: WarehouseRepository,
        user_repo: UserRepository,
        pool: PgPool,
        fonts_dir: String,
    ) -> Self {
        Self { contract_repo, warehouse_repo, user_repo, pool, fonts_dir }
    }

    pub async fn contract_pdf(&self, user: &User, contract_id: i64) -> Result<Vec<u8>, AppError> {
        // Leitura simples: o documento reflete o estado no momento da consulta
        let contract = self
            .contract_repo
            .find_contract(&self.pool, contract_id)
            .await?
            .ok_or(AppError::ContractNotFound(contract_id))?;
        if !can_view(&contract, user) {
            return Err(AppError::Forbidden);
        }

        let space = self
            .warehouse_repo
            .find_space(&self.pool, contract.space_id)
            .await?
            .ok_or(AppError::SpaceNotFound(contract.space_id))?;
        let warehouse = self
            .warehouse_repo
            .find_warehouse(&self.pool, space.warehouse_id)
            .await?
            .ok_or(AppError::WarehouseNotFound(space.warehouse_id))?;
        let client = self
            .user_repo
            .find_by_id(&self.pool, contract.client_id)
            .await?
            .ok_or(AppError::UserNotFound)?;
        let agent = self
            .user_repo
            .find_by_id(&self.pool, contract.agent_id)
            .await?
            .ok_or(AppError::UserNotFound)?;

        self.render(&contract, &contract_rows(&contract, &space, &warehouse, &client, &agent))
    }

    fn render(&self, contract: &Contract, rows: &[(String, String)]) -> Result<Vec<u8>, AppError> {
        let font_family = genpdf::fonts::from_files(&self.fonts_dir, "Roboto", None)
            .map_err(|e| AppError::DocumentRenderError(format!("fonte não encontrada em {}: {}", self.fonts_dir, e)))?;

        let mut doc = genpdf::Document::new(font_family);
        doc.set_title(format!("Contrato #{}", contract.id));
        let mut decorator = genpdf::SimplePageDecorator::new();
        decorator.set_margins(10);
        doc.set_page_decorator(decorator);

        // --- CABEÇALHO ---
        doc.push(elements::Paragraph::new("STORE-IT").styled(style::Style::new().bold().with_font_size(18)));
        doc.push(elements::Break::new(1));
        doc.push(
            elements::Paragraph::new(format!("CONTRATO DE ARRENDAMIENTO #{}", contract.id))
                .styled(style::Style::new().bold().with_font_size(14)),
        );
        doc.push(elements::Paragraph::new(format!(
            "Emitido el {}",
            contract.created_at.format("%d/%m/%Y")
        )));
        doc.push(elements::Break::new(2));

        // --- QUADRO ---
        let mut table = elements::TableLayout::new(vec![2, 5]);
        table.set_cell_decorator(elements::FrameCellDecorator::new(true, true, false));
        let style_bold = style::Style::new().bold();
        for (label, value) in rows {
            table
                .row()
                .element(elements::Paragraph::new(label.as_str()).styled(style_bold))
                .element(elements::Paragraph::new(value.as_str()))
                .push()
                .map_err(|e| AppError::DocumentRenderError(e.to_string()))?;
        }
        doc.push(table);

        if !contract.description.is_empty() {
            doc.push(elements::Break::new(2));
            doc.push(elements::Paragraph::new("Descripción").styled(style_bold));
            doc.push(elements::Paragraph::new(contract.description.as_str()));
        }

        // --- RENDER ---
        let mut buffer = Vec::new();
        doc.render(&mut buffer)
            .map_err(|e| AppError::DocumentRenderError(e.to_string()))?;

        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{auth::{AccountState, Role}, warehouse::{SpaceState, WarehouseState}};
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal::Decimal;

    fn make_user(id: i64, name: &str, role: Role) -> User {
        User {
            id,
            email: format!("u{id}@storeit.co"),
            password_hash: String::new(),
            name: name.into(),
            phone: "+573001234567".into(),
            phone_country: "CO".into(),
            secondary_phone: None,
            role,
            account_state: AccountState::Active,
            client_kind: None,
            warehouse_id: None,
            created_at: Utc::now(),
        }
    }

    fn fixtures() -> (Contract, Space, Warehouse) {
        let contract = Contract {
            id: 12,
            space_id: 3,
            client_id: 100,
            agent_id: 200,
            start_date: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 7, 31).unwrap(),
            value: Decimal::new(150000050, 2),
            description: String::new(),
            state: ContractState::Active,
            client_signed_at: Some(Utc.with_ymd_and_hms(2026, 1, 20, 9, 30, 0).unwrap()),
            agent_signed_at: None,
            closed_at: None,
            created_at: Utc::now(),
        };
        let space = Space {
            id: 3,
            warehouse_id: 1,
            total_area: Decimal::from(40),
            available_area: Decimal::from(40),
            height: Decimal::from(4),
            state: SpaceState::ContractedAvailable,
            contract_id: Some(12),
            created_at: Utc::now(),
        };
        let warehouse = Warehouse {
            id: 1,
            name: "Bodega Norte".into(),
            country: "CO".into(),
            city: "Armenia".into(),
            address: "Calle 10".into(),
            phone: "+573001234567".into(),
            total_area: Decimal::from(100),
            height: Decimal::from(6),
            state: WarehouseState::Active,
            created_at: Utc::now(),
        };
        (contract, space, warehouse)
    }

    #[test]
    fn test_rows_describe_parties_and_terms() {
        let (contract, space, warehouse) = fixtures();
        let client = make_user(100, "Laura", Role::Client);
        let agent = make_user(200, "Andrés", Role::SalesAgent);

        let rows = contract_rows(&contract, &space, &warehouse, &client, &agent);
        let get = |label: &str| rows.iter().find(|(l, _)| l == label).map(|(_, v)| v.clone()).unwrap();

        assert_eq!(get("Estado"), "Activo");
        assert!(get("Cliente").starts_with("Laura"));
        assert_eq!(get("Vigencia"), "01/02/2026 a 31/07/2026");
        assert_eq!(get("Valor"), "$ 1500000.50");
        assert_eq!(get("Firma del cliente"), "20/01/2026 09:30");
        assert_eq!(get("Firma del agente"), "Sin firma");
    }
}
