use std::fmt::{self, Display, Formatter};

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ControlCommand {
    EvalStart,
    EvalOutput,
    EvalEnd,
    Duplicate,
    PopEvaluatedValue,
    PopFunction,
    PopTunnel,
    BeginString,
    EndString,
    NoOp,
    ChoiceCount,
    Turns,
    TurnsSince,
    ReadCount,
    Random,
    SeedRandom,
    VisitIndex,
    SequenceShuffleIndex,
    StartThread,
    Done,
    End,
    ListFromInt,
    ListRange,
    ListRandom,
    BeginTag,
    EndTag,
}

impl ControlCommand {
    const ALL: [ControlCommand; 26] = [
        ControlCommand::EvalStart,
        ControlCommand::EvalOutput,
        ControlCommand::EvalEnd,
        ControlCommand::Duplicate,
        ControlCommand::PopEvaluatedValue,
        ControlCommand::PopFunction,
        ControlCommand::PopTunnel,
        ControlCommand::BeginString,
        ControlCommand::EndString,
        ControlCommand::NoOp,
        ControlCommand::ChoiceCount,
        ControlCommand::Turns,
        ControlCommand::TurnsSince,
        ControlCommand::ReadCount,
        ControlCommand::Random,
        ControlCommand::SeedRandom,
        ControlCommand::VisitIndex,
        ControlCommand::SequenceShuffleIndex,
        ControlCommand::StartThread,
        ControlCommand::Done,
        ControlCommand::End,
        ControlCommand::ListFromInt,
        ControlCommand::ListRange,
        ControlCommand::ListRandom,
        ControlCommand::BeginTag,
        ControlCommand::EndTag,
    ];

    /// The token used for this command in compiled story json.
    pub fn name(self) -> &'static str {
        match self {
            ControlCommand::EvalStart => "ev",
            ControlCommand::EvalOutput => "out",
            ControlCommand::EvalEnd => "/ev",
            ControlCommand::Duplicate => "du",
            ControlCommand::PopEvaluatedValue => "pop",
            ControlCommand::PopFunction => "~ret",
            ControlCommand::PopTunnel => "->->",
            ControlCommand::BeginString => "str",
            ControlCommand::EndString => "/str",
            ControlCommand::NoOp => "nop",
            ControlCommand::ChoiceCount => "choiceCnt",
            ControlCommand::Turns => "turn",
            ControlCommand::TurnsSince => "turns",
            ControlCommand::ReadCount => "readc",
            ControlCommand::Random => "rnd",
            ControlCommand::SeedRandom => "srnd",
            ControlCommand::VisitIndex => "visit",
            ControlCommand::SequenceShuffleIndex => "seq",
            ControlCommand::StartThread => "thread",
            ControlCommand::Done => "done",
            ControlCommand::End => "end",
            ControlCommand::ListFromInt => "listInt",
            ControlCommand::ListRange => "range",
            ControlCommand::ListRandom => "lrnd",
            ControlCommand::BeginTag => "#",
            ControlCommand::EndTag => "/#",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|command| command.name() == name)
    }
}

impl Display for ControlCommand {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique_and_round_trip() {
        for command in ControlCommand::ALL {
            assert_eq!(ControlCommand::from_name(command.name()), Some(command));
        }
        assert_eq!(ControlCommand::from_name("<>"), None);
    }
}
