//! Database layer (Firestore).

pub mod firestore;

pub use firestore::FirestoreDb;

/// Collection names as constants.
pub mod collections {
    pub const USUARIOS: &str = "usuarios";
    pub const INPUTS: &str = "inputs";
    pub const PAIRING_REQUESTS: &str = "pairingRequests";
    pub const PAREAMENTOS: &str = "pareamentos";
    pub const TAREFAS_MOMENTOS: &str = "tarefasMomentos";
    pub const NOTIFICACOES: &str = "notificacoes";
}
