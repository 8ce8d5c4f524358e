use std::fmt::{self, Display, Formatter};

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum PushPopType {
    Tunnel,
    Function,
    FunctionEvaluationFromGame,
}

impl PushPopType {
    pub(crate) fn to_index(self) -> i64 {
        match self {
            PushPopType::Tunnel => 0,
            PushPopType::Function => 1,
            PushPopType::FunctionEvaluationFromGame => 2,
        }
    }

    pub(crate) fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(PushPopType::Tunnel),
            1 => Some(PushPopType::Function),
            2 => Some(PushPopType::FunctionEvaluationFromGame),
            _ => None,
        }
    }

    /// How the construct that pops this frame is written in ink.
    pub(crate) fn pop_statement(self) -> &'static str {
        match self {
            PushPopType::Tunnel => "tunnel onwards statement (->->)",
            PushPopType::Function => "function return statement (~ return)",
            PushPopType::FunctionEvaluationFromGame => "end of function evaluated from game",
        }
    }
}

impl Display for PushPopType {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            PushPopType::Tunnel => write!(f, "tunnel"),
            PushPopType::Function => write!(f, "function"),
            PushPopType::FunctionEvaluationFromGame => write!(f, "function evaluation from game"),
        }
    }
}
