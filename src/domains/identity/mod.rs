//! Identity: sessions, the caller's profile and principal management

pub mod api;
pub mod routes;
pub mod service;

pub use service::{
    ChangePassword, ChangePasswordHandler, CreateUser, CreateUserHandler, GetProfile,
    GetProfileHandler, Login, LoginHandler, LoginResult, Logout, LogoutHandler, RefreshSession,
    RefreshSessionHandler,
};

use super::Dependencies;

pub fn register(deps: &Dependencies) {
    let mediator = &deps.mediator;

    mediator.register::<Login, _>(LoginHandler::new(
        deps.users.clone(),
        deps.access_logs.clone(),
        deps.credentials.clone(),
        deps.hasher.clone(),
    ));
    mediator.register::<RefreshSession, _>(RefreshSessionHandler::new(
        deps.users.clone(),
        deps.credentials.clone(),
        deps.transactor.clone(),
    ));
    mediator.register::<Logout, _>(LogoutHandler::new(deps.credentials.clone()));
    mediator.register::<GetProfile, _>(GetProfileHandler::new(deps.users.clone()));
    mediator.register::<ChangePassword, _>(ChangePasswordHandler::new(
        deps.users.clone(),
        deps.hasher.clone(),
    ));
    mediator.register::<CreateUser, _>(CreateUserHandler::new(
        deps.users.clone(),
        deps.access.clone(),
        deps.hasher.clone(),
        deps.transactor.clone(),
        deps.bus.clone(),
    ));
}
