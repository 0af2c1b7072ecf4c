//! Text layout of everything the tool prints.
use std::fmt::{Display, Formatter, Result};

use crate::{
    data::{
        ActiveProposals, AddressAnnotation, ExecutionHistory, Outcome, ParamName, ParamValue,
        ProposalReport, Report, ResolvedProposal, Transaction, VoteSummary,
    },
    parsing::{format_amount, format_timestamp, fraction_percent, percent},
};

fn flag(value: bool) -> &'static str {
    if value {
        "TRUE"
    } else {
        "FALSE"
    }
}

impl Display for AddressAnnotation {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            AddressAnnotation::Contract { name, address } => {
                write!(f, "contract:{}:{}", name, address)
            }
            AddressAnnotation::Account { name, address } => {
                write!(f, "account:{}:{}", name, address)
            }
            AddressAnnotation::Raw(s) => write!(f, "{}", s),
        }
    }
}

impl Display for ParamName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            ParamName::Named(name) => write!(f, "{}", name),
            ParamName::Index(i) => write!(f, "{}", i),
        }
    }
}

impl Display for ParamValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            ParamValue::Text(s) => write!(f, "{}", s),
            ParamValue::Integer(i) => write!(f, "{}", i),
            ParamValue::Address(a) => write!(f, "{}", a),
            ParamValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// `Contract.function(name=value)`, one parameter per indented line when there are several.
impl Display for Transaction {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}.{}(", self.contract, self.function)?;
        match self.params.as_slice() {
            [] => write!(f, ")")?,
            [(name, value)] => write!(f, "{}={})", name, value)?,
            params => {
                for (name, value) in params {
                    write!(f, "\n    {}={},", name, value)?;
                }
                write!(f, "\n)")?;
            }
        }
        if !self.value.is_zero() {
            write!(f, " [value {}]", format_amount(self.value))?;
        }
        Ok(())
    }
}

impl Display for VoteSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let total = self.tally.total();
        for (label, votes) in [
            ("Yes", self.tally.yes),
            ("No", self.tally.no),
            ("Abstain", self.tally.abstain),
        ] {
            writeln!(
                f,
                "{}: {} ({}%)",
                label,
                format_amount(votes),
                percent(votes, total)
            )?;
        }
        writeln!(
            f,
            "Participation: {}% of {} locked",
            percent(total, self.total_locked),
            format_amount(self.total_locked)
        )?;
        writeln!(f, "Baseline: {}%", fraction_percent(self.baseline))?;
        writeln!(f, "Threshold: {}%", fraction_percent(self.threshold))?;
        write!(f, "Yes needed: {}", format_amount(self.yes_needed))
    }
}

impl Display for ProposalReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        writeln!(f, "ID: {}", self.id)?;
        writeln!(f, "Proposer: {}", self.proposer_url)?;
        writeln!(f, "Description: {}", self.description_url)?;
        writeln!(f, "Deposit: {}", format_amount(self.deposit))?;
        writeln!(f, "Stage: {}", self.stage)?;
        writeln!(f, "Proposed: {}", format_timestamp(self.timeline.proposed))?;
        if let Some(t) = self.timeline.referendum {
            writeln!(f, "Referendum: {}", format_timestamp(t))?;
        }
        if let Some(t) = self.timeline.execution {
            writeln!(f, "Execution: {}", format_timestamp(t))?;
        }
        writeln!(f, "Expires: {}", format_timestamp(self.timeline.expires))?;
        writeln!(f, "Approved: {}", flag(self.approved))?;
        write!(f, "Passing: {}", flag(self.passing))?;
        if let Some(votes) = &self.votes {
            write!(f, "\n{}", votes)?;
        }
        write!(f, "\n\n")?;
        for (i, tx) in self.transactions.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", tx)?;
        }
        Ok(())
    }
}

impl Display for ResolvedProposal {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        writeln!(f, "ID: {}", self.id)?;
        writeln!(f, "Proposer: {}", self.proposer_url)?;
        match self.outcome {
            Outcome::Executed => write!(f, "EXECUTED"),
            Outcome::Expired => write!(f, "Stage: Expiration\nEXPIRED"),
        }
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Report::Live(r) => write!(f, "{}", r),
            Report::Resolved(r) => write!(f, "{}", r),
        }
    }
}

impl Display for ActiveProposals {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "Dequeued proposals:")?;
        if self.dequeued.is_empty() {
            write!(f, "\n  none")?;
        }
        for p in &self.dequeued {
            let stage = match p.stage {
                Some(s) => s.to_string(),
                None => String::from("unknown"),
            };
            write!(f, "\n  ID: {}, Stage: {}", p.id, stage)?;
            if p.expired {
                write!(f, ", EXPIRED")?;
            }
        }
        write!(f, "\nQueued proposals:")?;
        if self.queued.is_empty() {
            write!(f, "\n  none")?;
        }
        for p in &self.queued {
            write!(f, "\n  ID: {}, Upvotes: {}", p.id, format_amount(p.upvotes))?;
            if p.expired {
                write!(f, ", EXPIRED")?;
            }
        }
        Ok(())
    }
}

impl Display for ExecutionHistory {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "Executed proposals: {}", self.executed.len())?;
        for e in &self.executed {
            write!(
                f,
                "\n  ID: {}, Block: {}, Transaction: {}",
                e.id, e.block, e.transaction_url
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data::{DequeuedEntry, QueuedEntry, Timeline, VoteTally},
        parsing::fixed_one,
        types::Stage,
    };
    use web3::types::U256;

    fn ether(n: u64) -> U256 {
        U256::from(n) * U256::exp10(18)
    }

    fn call(params: Vec<(ParamName, ParamValue)>) -> Transaction {
        Transaction {
            contract: String::from("Governance"),
            function: String::from("setConstitution"),
            params,
            value: U256::zero(),
        }
    }

    fn report(votes: Option<VoteSummary>, transactions: Vec<Transaction>) -> ProposalReport {
        ProposalReport {
            id: U256::from(42u8),
            proposer_url: String::from("https://explorer.example/address/0xA1"),
            description_url: String::from("https://example.org/cgp-42"),
            deposit: ether(100),
            stage: Stage::Referendum,
            timeline: Timeline {
                proposed: 0,
                referendum: Some(86_400),
                execution: Some(6 * 86_400),
                expires: 9 * 86_400,
            },
            approved: true,
            passing: true,
            votes,
            transactions,
        }
    }

    #[test]
    fn single_and_wrapped_calls() {
        let one = call(vec![(
            ParamName::Named(String::from("threshold")),
            ParamValue::Integer(U256::from(7u8)),
        )]);
        assert_eq!(one.to_string(), "Governance.setConstitution(threshold=7)");

        let many = Transaction {
            value: ether(2),
            ..call(vec![
                (
                    ParamName::Index(0),
                    ParamValue::Address(AddressAnnotation::Raw(String::from("0xAb"))),
                ),
                (
                    ParamName::Named(String::from("ids")),
                    ParamValue::List(vec![
                        ParamValue::Integer(U256::one()),
                        ParamValue::Text(String::from("true")),
                    ]),
                ),
            ])
        };
        assert_eq!(
            many.to_string(),
            "Governance.setConstitution(\n    0=0xAb,\n    ids=[1, true],\n) [value 2.00]"
        );
        assert_eq!(call(vec![]).to_string(), "Governance.setConstitution()");
    }

    #[test]
    fn vote_breakdown() {
        let summary = VoteSummary {
            tally: VoteTally {
                yes: ether(600),
                no: ether(300),
                abstain: ether(100),
            },
            total_locked: ether(10_000),
            baseline: fixed_one() / U256::from(20u8),
            threshold: fixed_one() * U256::from(6u8) / U256::from(10u8),
            yes_needed: U256::zero(),
        };
        let text = report(Some(summary), vec![]).to_string();
        assert!(text.contains("Yes: 600.00 (60.00%)"));
        assert!(text.contains("No: 300.00 (30.00%)"));
        assert!(text.contains("Abstain: 100.00 (10.00%)"));
        assert!(text.contains("Participation: 10.00% of 10000.00 locked"));
        assert!(text.contains("Baseline: 5.00%"));
        assert!(text.contains("Threshold: 60.00%"));
        assert!(text.contains("Yes needed: 0.00"));
    }

    #[test]
    fn one_blank_line_before_transactions() {
        let tx = call(vec![]);
        let text = report(None, vec![tx.clone(), tx]).to_string();
        let (header, body) = text.split_once("\n\n").unwrap();
        assert!(header.starts_with("ID: 42\nProposer: https://explorer.example/address/0xA1"));
        assert!(header.ends_with("Passing: TRUE"));
        assert!(!header.contains("\n\n"));
        assert_eq!(
            body,
            "Governance.setConstitution()\nGovernance.setConstitution()"
        );
        assert!(header.contains("Referendum: 1970-01-02 00:00:00 UTC"));
    }

    #[test]
    fn resolved_and_listings() {
        let expired = ResolvedProposal {
            id: U256::from(3u8),
            proposer_url: String::from("p"),
            outcome: Outcome::Expired,
        };
        assert_eq!(expired.to_string(), "ID: 3\nProposer: p\nStage: Expiration\nEXPIRED");

        let active = ActiveProposals {
            dequeued: vec![DequeuedEntry {
                id: U256::from(4u8),
                stage: Some(Stage::Expiration),
                expired: true,
            }],
            queued: vec![QueuedEntry {
                id: U256::from(5u8),
                upvotes: ether(3),
                expired: false,
            }],
        };
        assert_eq!(
            active.to_string(),
            "Dequeued proposals:\n  ID: 4, Stage: Expiration, EXPIRED\nQueued proposals:\n  ID: 5, Upvotes: 3.00"
        );
        assert_eq!(
            ActiveProposals::default().to_string(),
            "Dequeued proposals:\n  none\nQueued proposals:\n  none"
        );
    }
}
