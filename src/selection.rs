use crate::error::SelectionError;
use crate::scanner::Host;

/// Pick a host by its 1-based position in the discovery list.
pub fn select(hosts: &[Host], index: usize) -> Result<&Host, SelectionError> {
    index
        .checked_sub(1)
        .and_then(|i| hosts.get(i))
        .ok_or(SelectionError::OutOfRange {
            index,
            count: hosts.len(),
        })
}

pub fn parse_selection(input: &str) -> Result<usize, SelectionError> {
    let input = input.trim();
    input
        .parse::<usize>()
        .map_err(|_| SelectionError::NotANumber(input.to_string()))
}
