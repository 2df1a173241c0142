/// Default Message Catalogs
///
/// One catalog per test mode, each carrying English and Finnish templates.
/// Exercises layer their own overrides on top of these.

use crate::catalog::{MessageCatalog, MessageEntry};
use crate::harness::TestMode;

type Template = (&'static str, &'static str, &'static str);

/// Messages for faults any kind of candidate code can raise.
const RUNTIME_FAULTS: &[Template] = &[
    (
        "GenericErrorMsg",
        "Your code raised an unexpected error.\n{ename}: {emsg}",
        "Koodisi aiheutti odottamattoman virheen.\n{ename}: {emsg}",
    ),
    (
        "PrintExcLine",
        "The error happened on line {lineno}:\n{{{{{{\n{line}\n}}}}}}",
        "Virhe tapahtui rivillä {lineno}:\n{{{{{{\n{line}\n}}}}}}",
    ),
    (
        "PrintInputVector",
        "Input lines given to your code:\n{inputs}",
        "Koodillesi annetut syöterivit:\n{inputs}",
    ),
    (
        "PrintStudentOutput",
        "Your code printed:\n{{{{{{\n{output}\n}}}}}}",
        "Koodisi tulosti:\n{{{{{{\n{output}\n}}}}}}",
    ),
    (
        "SyntaxError",
        "Your code contains a syntax error:\n{emsg}",
        "Koodissasi on syntaksivirhe:\n{emsg}",
    ),
    (
        "IndentationError",
        "Your code is indented incorrectly:\n{emsg}",
        "Koodisi sisennys on virheellinen:\n{emsg}",
    ),
    (
        "NameError",
        "Your code uses a name that has not been defined:\n{emsg}",
        "Koodisi käyttää nimeä, jota ei ole määritelty:\n{emsg}",
    ),
    (
        "TypeError",
        "Your code used a value of the wrong type:\n{emsg}",
        "Koodisi käytti väärän tyyppistä arvoa:\n{emsg}",
    ),
    (
        "ValueError",
        "Your code tried to convert a value that cannot be converted:\n{emsg}",
        "Koodisi yritti muuntaa arvon, jota ei voi muuntaa:\n{emsg}",
    ),
    (
        "IndexError",
        "Your code used an index outside of a list or string:\n{emsg}",
        "Koodisi käytti indeksiä, joka on listan tai merkkijonon ulkopuolella:\n{emsg}",
    ),
    (
        "AttributeError",
        "Your code is missing something it was expected to define:\n{emsg}",
        "Koodistasi puuttuu jotain, mitä sen odotettiin määrittelevän:\n{emsg}",
    ),
    (
        "ImportError",
        "Your code imports a module that is not available:\n{emsg}",
        "Koodisi tuo moduulin, joka ei ole käytettävissä:\n{emsg}",
    ),
    (
        "EOFError",
        "Your code asked for more input than the test gave it.\nInputs given:\n{inputs}",
        "Koodisi pyysi enemmän syötteitä kuin testi antoi.\nAnnetut syötteet:\n{inputs}",
    ),
    (
        "SystemExit",
        "Your code ended the program before the test was finished. Do not exit the program from the submitted code.",
        "Koodisi lopetti ohjelman ennen kuin testi päättyi. Älä lopeta ohjelmaa palautetusta koodista.",
    ),
];

const LOADING: &[Template] = &[
    (
        "LoadingModule",
        "Loading module {name}...",
        "Ladataan moduulia {name}...",
    ),
    (
        "MissingFileExtension",
        "The file name must end with {ext}.",
        "Tiedoston nimen täytyy päättyä {ext}.",
    ),
    (
        "BadModuleName",
        "The file name {name} contains characters that are not allowed. Use only letters, digits and underscores.",
        "Tiedoston nimessä {name} on kiellettyjä merkkejä. Käytä vain kirjaimia, numeroita ja alaviivoja.",
    ),
    (
        "SystemModuleName",
        "The file name {name} is reserved by the system. Rename your file.",
        "Tiedoston nimi {name} on järjestelmän varaama. Nimeä tiedostosi uudelleen.",
    ),
    (
        "DisallowedOutput",
        "Your code printed something while it was being loaded. In this exercise nothing may be printed outside the tested functions.\n{{{{{{\n{output}\n}}}}}}",
        "Koodisi tulosti jotain ladattaessa. Tässä tehtävässä testattavien funktioiden ulkopuolella ei saa tulostaa.\n{{{{{{\n{output}\n}}}}}}",
    ),
];

/// Verdict and diagnostics keys shared by function, program and snippet tests.
const VALIDATION: &[Template] = &[
    (
        "OutputParseError",
        "Your output could not be interpreted: {reason}",
        "Tulostettasi ei voitu tulkita: {reason}",
    ),
    (
        "OutputPatternInfo",
        "The output is expected to match:\n{pattern}",
        "Tulosteen odotetaan vastaavan mallia:\n{pattern}",
    ),
    (
        "AdditionalTests",
        "Further tests were run to find the cause of the problem:",
        "Ongelman syyn selvittämiseksi ajettiin lisätestejä:",
    ),
    (
        "AdditionalInfo",
        "Additional information about your code:",
        "Lisätietoa koodistasi:",
    ),
    (
        "CorrectMessage",
        "Your code printed the expected message.",
        "Koodisi tulosti odotetun viestin.",
    ),
    (
        "IncorrectMessage",
        "Your code did not print the expected message.",
        "Koodisi ei tulostanut odotettua viestiä.",
    ),
    ("MessageInfo", "", ""),
];

const FUNCTION: &[Template] = &[
    (
        "FunctionName",
        "Testing function {name}...",
        "Testataan funktiota {name}...",
    ),
    (
        "IsNotFunction",
        "{name} is defined in your code but it is not a function.",
        "{name} on määritelty koodissasi, mutta se ei ole funktio.",
    ),
    (
        "TypeError",
        "The function was called with arguments it could not handle:\n{emsg}",
        "Funktiota kutsuttiin argumenteilla, joita se ei osannut käsitellä:\n{emsg}",
    ),
    (
        "CorrectResult",
        "Your function returned the correct result.",
        "Funktiosi palautti oikean tuloksen.",
    ),
    (
        "IncorrectResult",
        "Your function returned an incorrect result.",
        "Funktiosi palautti väärän tuloksen.",
    ),
    (
        "PrintTestVector",
        "Function call used in the test:\n{call}",
        "Testissä käytetty funktiokutsu:\n{call}",
    ),
    (
        "PrintStudentResult",
        "Your function returned:\n{res}",
        "Funktiosi palautti:\n{res}",
    ),
    (
        "PrintReference",
        "Expected result:\n{ref}",
        "Odotettu tulos:\n{ref}",
    ),
    (
        "RepeatingResult",
        "Your function returned the same result as in the previous test. Make sure the result depends on the arguments.",
        "Funktiosi palautti saman tuloksen kuin edellisessä testissä. Varmista, että tulos riippuu argumenteista.",
    ),
];

const PROGRAM: &[Template] = &[
    (
        "ProgramName",
        "Testing program {name}...",
        "Testataan ohjelmaa {name}...",
    ),
    (
        "CorrectResult",
        "Your program produced the correct output.",
        "Ohjelmasi tuotti oikean tulosteen.",
    ),
    (
        "IncorrectResult",
        "Your program produced incorrect output.",
        "Ohjelmasi tuotti väärän tulosteen.",
    ),
    (
        "PrintStudentResult",
        "Values read from your output:\n{parsed}",
        "Tulosteestasi luetut arvot:\n{parsed}",
    ),
    (
        "PrintReference",
        "Expected:\n{ref}",
        "Odotettiin:\n{ref}",
    ),
    (
        "RepeatingResult",
        "Your program printed the same output as in the previous test. Make sure the output depends on the inputs.",
        "Ohjelmasi tulosti saman kuin edellisessä testissä. Varmista, että tuloste riippuu syötteistä.",
    ),
];

const SNIPPET: &[Template] = &[
    (
        "SnippetTest",
        "Testing code snippet...",
        "Testataan koodinpätkää...",
    ),
    (
        "CorrectResult",
        "Your code produced the correct values.",
        "Koodisi tuotti oikeat arvot.",
    ),
    (
        "IncorrectResult",
        "Your code produced incorrect values.",
        "Koodisi tuotti vääriä arvoja.",
    ),
    (
        "fail_missing_variable",
        "Your code did not create all the required variables.",
        "Koodisi ei luonut kaikkia vaadittuja muuttujia.",
    ),
    (
        "fail_variable_value",
        "One or more variables have the wrong value.",
        "Yhdellä tai useammalla muuttujalla on väärä arvo.",
    ),
    (
        "PrintStudentResult",
        "Variables created by your code:\n{res}",
        "Koodisi luomat muuttujat:\n{res}",
    ),
    (
        "PrintReference",
        "Expected variables:\n{ref}",
        "Odotetut muuttujat:\n{ref}",
    ),
    (
        "RepeatingResult",
        "Your code produced the same values as before.",
        "Koodisi tuotti samat arvot kuin aiemmin.",
    ),
];

fn add_all(catalog: &mut MessageCatalog, templates: &[Template]) {
    for (key, en, fi) in templates {
        catalog.set(key, "en", MessageEntry::new(*en));
        catalog.set(key, "fi", MessageEntry::new(*fi));
    }
}

fn add_hints(catalog: &mut MessageCatalog, key: &str, en: &[&str], fi: &[&str]) {
    for (locale, hints) in [("en", en), ("fi", fi)] {
        if let Some(entry) = catalog.get(key, locale).cloned() {
            catalog.set(key, locale, entry.with_hints(hints.iter().copied()));
        }
    }
}

/// Messages used while loading a candidate.
pub fn loading_catalog() -> MessageCatalog {
    let mut catalog = MessageCatalog::new();
    add_all(&mut catalog, RUNTIME_FAULTS);
    add_all(&mut catalog, LOADING);
    add_hints(
        &mut catalog,
        "SyntaxError",
        &["Check brackets, quotes and colons on and just before the reported line."],
        &["Tarkista sulut, lainausmerkit ja kaksoispisteet ilmoitetulla ja sitä edeltävällä rivillä."],
    );
    add_hints(
        &mut catalog,
        "EOFError",
        &["Code outside functions is run when the file is loaded. Move input reads inside the main function."],
        &["Funktioiden ulkopuolinen koodi ajetaan tiedostoa ladattaessa. Siirrä syötteiden luku pääfunktion sisään."],
    );
    catalog
}

pub fn catalog_for(mode: TestMode) -> MessageCatalog {
    let mut catalog = MessageCatalog::new();
    add_all(&mut catalog, RUNTIME_FAULTS);
    add_all(&mut catalog, VALIDATION);
    match mode {
        TestMode::Function => add_all(&mut catalog, FUNCTION),
        TestMode::Program => add_all(&mut catalog, PROGRAM),
        TestMode::Snippet => add_all(&mut catalog, SNIPPET),
    }
    add_hints(
        &mut catalog,
        "RepeatingResult",
        &["Fixed return values or prints only pass tests by accident."],
        &["Kiinteät paluuarvot tai tulosteet menevät testeistä läpi vain sattumalta."],
    );
    catalog
}
