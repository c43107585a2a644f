//! CLI handlers for warehouse, part-location, and customer commands.

use serde::Serialize;

use crate::api::{
    CustomerFilter, NewWarehouse, PartLocationFilter, SearchRequest, WarehouseFilter,
};
use crate::client::AutoPartClient;
use crate::error::{ApiError, AutoPartError};

use super::{CustomerCommands, PageArgs, PartLocationCommands, WarehouseCommands};

pub async fn warehouses(client: &AutoPartClient, command: WarehouseCommands) -> Result<(), ApiError> {
    let queries = client.warehouses();
    match command {
        WarehouseCommands::List {
            paging,
            name,
            code,
            active,
        } => {
            let filter = WarehouseFilter { name, code, active };
            print_json(&queries.search(search(filter, paging)).await?)
        }
        WarehouseCommands::Get { id } => print_json(&queries.get(id).await?),
        WarehouseCommands::Create {
            name,
            code,
            address,
            city,
            country,
        } => {
            let payload = NewWarehouse {
                name,
                code,
                address,
                city,
                country,
            };
            print_json(&queries.create(Some(&payload)).await?)
        }
        WarehouseCommands::Delete { id } => {
            queries.delete(id).await?;
            println!("🗑️  Deleted warehouse {id}");
            Ok(())
        }
    }
}

pub async fn part_locations(
    client: &AutoPartClient,
    command: PartLocationCommands,
) -> Result<(), ApiError> {
    let queries = client.part_locations();
    match command {
        PartLocationCommands::List {
            paging,
            part_id,
            warehouse_id,
        } => {
            let filter = PartLocationFilter {
                part_id,
                warehouse_id,
            };
            print_json(&queries.search(search(filter, paging)).await?)
        }
        PartLocationCommands::Get { id } => print_json(&queries.get(id).await?),
    }
}

pub async fn customers(client: &AutoPartClient, command: CustomerCommands) -> Result<(), ApiError> {
    let queries = client.customers();
    match command {
        CustomerCommands::List {
            paging,
            name,
            email,
        } => {
            let filter = CustomerFilter { name, email };
            print_json(&queries.search(search(filter, paging)).await?)
        }
        CustomerCommands::Get { id } => print_json(&queries.get(id).await?),
    }
}

fn search<F>(filter: F, paging: PageArgs) -> SearchRequest<F> {
    SearchRequest {
        filter,
        page: paging.page,
        page_size: paging.page_size,
        sort: None,
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), ApiError> {
    let rendered = serde_json::to_string_pretty(value).map_err(AutoPartError::from)?;
    println!("{rendered}");
    Ok(())
}
