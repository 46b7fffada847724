//! Companies, economic groups and the rows granting access to them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::status::{AccessLevel, DocumentType, Status, TaxRegime};
use super::time;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(rename = "logradouro", default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(rename = "numero", default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(rename = "complemento", default, skip_serializing_if = "Option::is_none")]
    pub complement: Option<String>,
    #[serde(rename = "bairro", default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(rename = "cidade", default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(rename = "estado", default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(rename = "pais", default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(rename = "cep", default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "telefone", default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(rename = "nome_contato", default, skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
}

/// Tenant company (`empresas`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: Uuid,

    #[serde(rename = "nome")]
    pub name: String,

    #[serde(rename = "nome_fantasia", default)]
    pub trade_name: Option<String>,

    /// CNPJ, CPF or foreign registration number
    #[serde(rename = "cnpj_cpf", default)]
    pub document: Option<String>,

    #[serde(rename = "tipo_documento", default)]
    pub document_type: Option<DocumentType>,

    #[serde(rename = "regime_tributario", default)]
    pub tax_regime: Option<TaxRegime>,

    #[serde(rename = "url_logo", default)]
    pub logo_url: Option<String>,

    #[serde(rename = "endereco", default)]
    pub address: Option<Address>,

    #[serde(rename = "contato", default)]
    pub contact: Option<Contact>,

    #[serde(default)]
    pub status: Status,

    #[serde(rename = "data_criacao", default, deserialize_with = "time::lenient")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(rename = "data_atualizacao", default, deserialize_with = "time::lenient")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Fields for a new company
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCompany {
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "nome_fantasia", default)]
    pub trade_name: Option<String>,
    #[serde(rename = "cnpj_cpf", default)]
    pub document: Option<String>,
    #[serde(rename = "tipo_documento")]
    pub document_type: DocumentType,
    #[serde(rename = "regime_tributario", default)]
    pub tax_regime: Option<TaxRegime>,
    #[serde(rename = "url_logo", default)]
    pub logo_url: Option<String>,
    #[serde(rename = "endereco", default)]
    pub address: Option<Address>,
    #[serde(rename = "contato", default)]
    pub contact: Option<Contact>,
}

/// Company fields to change; `None` leaves the column untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyChanges {
    #[serde(rename = "nome", default)]
    pub name: Option<String>,
    #[serde(rename = "nome_fantasia", default)]
    pub trade_name: Option<String>,
    #[serde(rename = "cnpj_cpf", default)]
    pub document: Option<String>,
    #[serde(rename = "tipo_documento", default)]
    pub document_type: Option<DocumentType>,
    #[serde(rename = "regime_tributario", default)]
    pub tax_regime: Option<TaxRegime>,
    #[serde(rename = "url_logo", default)]
    pub logo_url: Option<String>,
    #[serde(rename = "endereco", default)]
    pub address: Option<Address>,
    #[serde(rename = "contato", default)]
    pub contact: Option<Contact>,
    #[serde(default)]
    pub status: Option<Status>,
}

impl CompanyChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Economic group (`grupos_economicos`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomicGroup {
    pub id: Uuid,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "descricao", default)]
    pub description: Option<String>,
    #[serde(rename = "url_logo", default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub status: Status,
    #[serde(rename = "data_criacao", default, deserialize_with = "time::lenient")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "data_atualizacao", default, deserialize_with = "time::lenient")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewGroup {
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "descricao", default)]
    pub description: Option<String>,
    #[serde(rename = "url_logo", default)]
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupChanges {
    #[serde(rename = "nome", default)]
    pub name: Option<String>,
    #[serde(rename = "descricao", default)]
    pub description: Option<String>,
    #[serde(rename = "url_logo", default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub status: Option<Status>,
}

impl GroupChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Membership of a company in a group (`associacoes_empresa_grupo`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupCompany {
    #[serde(rename = "grupo_id")]
    pub group_id: Uuid,
    #[serde(rename = "empresa_id")]
    pub company_id: Uuid,
    #[serde(rename = "empresa_principal", default)]
    pub primary: bool,
    #[serde(default)]
    pub status: Status,
    /// Active company row, when it is one
    #[serde(rename = "empresa", default, skip_deserializing)]
    pub company: Option<Company>,
}

/// Access row of a user on a company or group; only the level is read
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct AccessGrant {
    #[serde(rename = "nivel_acesso")]
    pub level: AccessLevel,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_company_decodes_from_row() {
        let id = Uuid::new_v4();
        let company: Company = serde_json::from_value(json!({
            "id": id,
            "nome": "Acme Ltda",
            "cnpj_cpf": "12.345.678/0001-90",
            "tipo_documento": "CNPJ",
            "endereco": {"cidade": "Recife", "estado": "PE"},
            "status": "ativo",
            "data_criacao": "2024-01-02T10:00:00.123456"
        }))
        .unwrap();

        assert_eq!(company.id, id);
        assert_eq!(company.name, "Acme Ltda");
        assert_eq!(company.document_type, Some(DocumentType::Cnpj));
        assert_eq!(company.address.unwrap().city.as_deref(), Some("Recife"));
        assert!(company.created_at.is_some());
    }

    #[test]
    fn test_company_requires_id_and_name() {
        assert!(serde_json::from_value::<Company>(json!({"nome": "Sem id"})).is_err());
        assert!(serde_json::from_value::<Company>(json!({"id": Uuid::new_v4()})).is_err());
    }
}
