//! Organization: companies, branches and access to them

pub mod api;
pub mod routes;
pub mod service;

pub use service::{
    AssignBranchAccess, AssignBranchAccessHandler, BranchAssignment, CreateBranch,
    CreateBranchHandler, CreateCompany, CreateCompanyHandler, GrantCompanyRole,
    GrantCompanyRoleHandler, ListBranches, ListBranchesHandler,
};

use super::Dependencies;

pub fn register(deps: &Dependencies) {
    let mediator = &deps.mediator;

    mediator.register::<CreateCompany, _>(CreateCompanyHandler::new(deps.companies.clone()));
    mediator.register::<GrantCompanyRole, _>(GrantCompanyRoleHandler::new(deps.access.clone()));
    mediator.register::<ListBranches, _>(ListBranchesHandler::new(deps.branches.clone()));
    mediator.register::<CreateBranch, _>(CreateBranchHandler::new(
        deps.branches.clone(),
        deps.transactor.clone(),
        deps.bus.clone(),
    ));
    mediator.register::<AssignBranchAccess, _>(AssignBranchAccessHandler::new(
        deps.access.clone(),
        deps.branches.clone(),
        deps.transactor.clone(),
        deps.bus.clone(),
    ));
}
