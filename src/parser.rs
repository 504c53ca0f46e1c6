use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while1},
    character::complete::{digit1, multispace1},
    combinator::{map, map_res, opt},
    sequence::{preceded, terminated, tuple},
    IResult,
};

#[derive(Debug, PartialEq, Clone)]
pub enum Command {
    Tickers,
    Average { ticker: String, minutes: u32 },
    Correlation { a: String, b: String, minutes: u32 },
    Matrix { minutes: u32 },
    Help,
    Exit,
}

// --- BASIC PARSERS ---

fn parse_ticker(input: &str) -> IResult<&str, String> {
    map(
        take_while1(|c: char| c.is_ascii_alphanumeric() || c == '.' || c == '-'),
        |s: &str| s.to_uppercase(),
    )(input)
}

fn parse_minutes(input: &str) -> IResult<&str, u32> {
    map_res(digit1, |s: &str| s.parse::<u32>())(input)
}

// --- HELPERS ---
fn tag_ci(t: &'static str) -> impl FnMut(&str) -> IResult<&str, &str> {
    move |input| tag_no_case(t)(input)
}

fn sp(input: &str) -> IResult<&str, &str> {
    multispace1(input)
}

// --- COMMAND PARSERS ---

fn parse_tickers(input: &str) -> IResult<&str, Command> {
    let (input, _) = alt((tag_ci("TICKERS"), tag_ci("SYMBOLS")))(input)?;
    Ok((input, Command::Tickers))
}

/// `AVG AAPL 10` or `AVG AAPL LAST 10`
fn parse_average(input: &str) -> IResult<&str, Command> {
    let (input, _) = alt((tag_ci("AVERAGE"), tag_ci("AVG")))(input)?;
    let (input, ticker) = preceded(sp, parse_ticker)(input)?;
    let (input, _) = sp(input)?;
    let (input, _) = opt(terminated(tag_ci("LAST"), sp))(input)?;
    let (input, minutes) = parse_minutes(input)?;
    Ok((input, Command::Average { ticker, minutes }))
}

/// `CORR AAPL MSFT 30`
fn parse_correlation(input: &str) -> IResult<&str, Command> {
    let (input, _) = alt((tag_ci("CORRELATE"), tag_ci("CORR")))(input)?;
    let (input, (_, a, _, b, _)) = tuple((sp, parse_ticker, sp, parse_ticker, sp))(input)?;
    let (input, minutes) = parse_minutes(input)?;
    Ok((input, Command::Correlation { a, b, minutes }))
}

fn parse_matrix(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("MATRIX")(input)?;
    let (input, minutes) = preceded(sp, parse_minutes)(input)?;
    Ok((input, Command::Matrix { minutes }))
}

fn parse_help(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("HELP")(input)?;
    Ok((input, Command::Help))
}

fn parse_exit(input: &str) -> IResult<&str, Command> {
    let (input, _) = alt((tag_ci("EXIT"), tag_ci("QUIT")))(input)?;
    Ok((input, Command::Exit))
}

pub fn parse_command(input: &str) -> Result<Command, String> {
    let input = input.trim();
    let result = alt((
        parse_tickers,
        parse_average,
        parse_correlation,
        parse_matrix,
        parse_help,
        parse_exit,
    ))(input);

    match result {
        Ok((remainder, cmd)) => {
            if !remainder.trim().is_empty() {
                return Err(format!("Unexpected tokens at end: '{}'", remainder));
            }
            Ok(cmd)
        },
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let context: String = e.input.chars().take(20).collect();
            if context.len() < e.input.len() {
                Err(format!("Invalid syntax near: '{}...'", context))
            } else {
                Err(format!("Invalid syntax near: '{}'", context))
            }
        },
        Err(nom::Err::Incomplete(_)) => Err("Incomplete command.".to_string()),
    }
}
