//! CLI auth command handlers for login, logout, status, and signup.

use crate::auth::{LoginRequest, SignupRequest};
use crate::client::AutoPartClient;
use crate::error::ApiError;

use super::{AuthCommands, LoginArgs, SignupArgs};

pub async fn handle(client: &AutoPartClient, command: AuthCommands) -> Result<(), ApiError> {
    match command {
        AuthCommands::Login(args) => login(client, args).await,
        AuthCommands::Logout => logout(client).await,
        AuthCommands::Status => {
            status(client);
            Ok(())
        }
        AuthCommands::Signup(args) => signup(client, args).await,
    }
}

async fn login(client: &AutoPartClient, args: LoginArgs) -> Result<(), ApiError> {
    let request = LoginRequest {
        username: args.username,
        password: args.password,
    };
    client.auth().login(&request).await?;
    println!("✅ Logged in as {}", request.username);
    Ok(())
}

async fn logout(client: &AutoPartClient) -> Result<(), ApiError> {
    match client.auth().logout().await {
        Ok(()) => println!("✅ Logged out"),
        Err(err) => {
            // Local tokens are gone either way.
            println!("⚠️  Logged out locally; backend said: {}", ApiError::from(err));
        }
    }
    Ok(())
}

fn status(client: &AutoPartClient) {
    let credentials = client.transport().store().credentials();
    let mark = |present: bool| if present { "✓" } else { "✗" };
    println!("Backend:       {}", client.transport().config().base_url());
    println!("Access token:  {}", mark(credentials.access_token.is_some()));
    println!("Refresh token: {}", mark(credentials.refresh_token.is_some()));
}

async fn signup(client: &AutoPartClient, args: SignupArgs) -> Result<(), ApiError> {
    let user = client
        .auth()
        .signup(&SignupRequest {
            username: args.username,
            email: args.email,
            password: args.password,
            first_name: args.first_name,
            last_name: args.last_name,
        })
        .await?;
    println!("✅ Created user {} (id {})", user.username, user.id);
    Ok(())
}
