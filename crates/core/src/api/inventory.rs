#![allow(missing_docs)]

use reqwest::Method;
use serde::Serialize;

use super::ApiClient;
use crate::{
    error::ApiError,
    models::{
        ExchangeRate, NewPurchase, NewShoe, Purchase, PurchaseStatus, PurchaseUpdate, Shoe,
        ShoeFilter, ShoeUpdate, StockFilter, StockItem, Supplier, TodoGroup,
    },
};

#[derive(Serialize)]
struct QuantityUpdate {
    quantity: i64,
}

#[derive(Serialize)]
struct RateUpdate {
    rate: f64,
}

#[derive(Serialize)]
struct StatusQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<PurchaseStatus>,
}

impl ApiClient {
    pub async fn list_shoes(&self, filter: &ShoeFilter) -> Result<Vec<Shoe>, ApiError> {
        self.get_with_query(&["shoes"], filter).await
    }

    pub async fn get_shoe(&self, id: &str) -> Result<Shoe, ApiError> {
        self.get(&["shoes", id]).await
    }

    pub async fn create_shoe(&self, shoe: &NewShoe) -> Result<Shoe, ApiError> {
        self.send_json(Method::POST, &["shoes"], shoe).await
    }

    pub async fn update_shoe(&self, id: &str, update: &ShoeUpdate) -> Result<Shoe, ApiError> {
        self.send_json(Method::PATCH, &["shoes", id], update).await
    }

    pub async fn delete_shoe(&self, id: &str) -> Result<(), ApiError> {
        self.send_unit::<()>(Method::DELETE, &["shoes", id], None)
            .await
    }

    pub async fn list_stock(&self, filter: &StockFilter) -> Result<Vec<StockItem>, ApiError> {
        self.get_with_query(&["stock"], filter).await
    }

    pub async fn update_stock(&self, id: &str, quantity: i64) -> Result<StockItem, ApiError> {
        self.send_json(Method::PATCH, &["stock", id], &QuantityUpdate { quantity })
            .await
    }

    /// Purchases, optionally restricted to one status.
    pub async fn list_purchases(
        &self,
        status: Option<PurchaseStatus>,
    ) -> Result<Vec<Purchase>, ApiError> {
        self.get_with_query(&["purchases"], &StatusQuery { status })
            .await
    }

    /// Outstanding purchases grouped by supplier.
    pub async fn todo_purchases(&self) -> Result<Vec<TodoGroup>, ApiError> {
        self.get(&["purchases", "todo"]).await
    }

    pub async fn create_purchase(&self, purchase: &NewPurchase) -> Result<Purchase, ApiError> {
        self.send_json(Method::POST, &["purchases"], purchase).await
    }

    pub async fn update_purchase(
        &self,
        id: &str,
        update: &PurchaseUpdate,
    ) -> Result<Purchase, ApiError> {
        self.send_json(Method::PATCH, &["purchases", id], update)
            .await
    }

    pub async fn delete_purchase(&self, id: &str) -> Result<(), ApiError> {
        self.send_unit::<()>(Method::DELETE, &["purchases", id], None)
            .await
    }

    pub async fn mark_purchase_todo(&self, id: &str) -> Result<Purchase, ApiError> {
        self.send_json(Method::POST, &["purchases", id, "todo"], &())
            .await
    }

    pub async fn mark_purchase_done(&self, id: &str) -> Result<Purchase, ApiError> {
        self.send_json(Method::POST, &["purchases", id, "done"], &())
            .await
    }

    pub async fn list_suppliers(&self) -> Result<Vec<Supplier>, ApiError> {
        self.get(&["suppliers"]).await
    }

    pub async fn exchange_rate(&self) -> Result<ExchangeRate, ApiError> {
        self.get(&["exchange-rate"]).await
    }

    pub async fn set_exchange_rate(&self, rate: f64) -> Result<ExchangeRate, ApiError> {
        self.send_json(Method::PUT, &["exchange-rate"], &RateUpdate { rate })
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::{
        matchers::{body_json, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;

    fn purchase(id: &str, status: &str) -> serde_json::Value {
        json!({
            "id": id,
            "shoeId": "s1",
            "supplier": "Erbil Wholesale",
            "quantity": 2,
            "unitPrice": 30.0,
            "currency": "USD",
            "status": status
        })
    }

    #[tokio::test]
    async fn purchase_endpoints() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/purchases"))
            .and(query_param("status", "done"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([purchase("p1", "done")])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/purchases/todo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "supplier": "Erbil Wholesale",
                "purchases": [purchase("p2", "todo")],
                "totalQuantity": 2
            }])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/purchases/p2/done"))
            .respond_with(ResponseTemplate::new(200).set_body_json(purchase("p2", "done")))
            .expect(1)
            .mount(&server)
            .await;

        let api = ApiClient::new(&server.uri(), Duration::from_secs(5))?;
        let done = api.list_purchases(Some(PurchaseStatus::Done)).await?;
        assert_eq!(done[0].status, PurchaseStatus::Done);

        let groups = api.todo_purchases().await?;
        assert_eq!(groups[0].total_quantity, 2);
        assert_eq!(groups[0].purchases[0].id, "p2");

        let marked = api.mark_purchase_done("p2").await?;
        assert_eq!(marked.status, PurchaseStatus::Done);
        Ok(())
    }

    #[tokio::test]
    async fn stock_and_rate_updates_send_bodies() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/stock/st1"))
            .and(body_json(json!({ "quantity": 12 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "st1", "shoeId": "s1", "quantity": 12
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/exchange-rate"))
            .and(body_json(json!({ "rate": 1310.0 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "rate": 1310.0 })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/shoes/s9"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let api = ApiClient::new(&server.uri(), Duration::from_secs(5))?;
        assert_eq!(api.update_stock("st1", 12).await?.quantity, 12);
        assert_eq!(api.set_exchange_rate(1310.0).await?.rate, 1310.0);
        api.delete_shoe("s9").await?;
        Ok(())
    }
}
