use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractError {
    #[error("request must contain either `messages` or `message`")]
    EmptyTurn,
}
