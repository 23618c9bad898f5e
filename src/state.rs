use crate::{
    db::{DbPool, OrmConn},
    docstore::DocStore,
    services::auth_service::AccountResolver,
    session::SessionKeys,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub docs: DocStore,
    pub sessions: SessionKeys,
    pub accounts: AccountResolver,
}

impl AppState {
    pub fn new(pool: DbPool, orm: OrmConn, docs: DocStore, sessions: SessionKeys) -> Self {
        let accounts = AccountResolver::new(orm.clone(), docs.clone());
        Self {
            pool,
            orm,
            docs,
            sessions,
            accounts,
        }
    }
}
