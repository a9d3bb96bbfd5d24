//! Built-in examples and grammars
//!
//! Used when the configured directories are absent and written to disk by
//! `dslsmith init`.

use super::{Example, ExampleFile};

/// Grammar of the arithmetic sample language
pub const SAMPLE_DSL_GRAMMAR: &str = r#"grammar SampleDSL;

// Lexer rules
ID : [a-zA-Z]+ ;
INT : [0-9]+ ;
WS : [ \t\r\n]+ -> skip ;

// Parser rules
program : statement+ ;

statement : assignment
          | printStatement
          ;

assignment : ID '=' expression ';' ;

printStatement : 'print' expression ';';

expression : ID
           | INT
           | expression '+' expression
           | expression '-' expression
           | '(' expression ')'
           ;
"#;

/// Grammar of the Classroom language
pub const CLASSROOM_GRAMMAR: &str = r#"grammar Classroom;

// Lexer rules
PROGRAM : 'program' ;
ACTION : 'action' ;
MAIN : 'main' ;
VALUE : 'value' ;
NOTE : 'note' ;
NOTES : 'Notes' ;
TAKE : 'take' ;
ID : [a-zA-Z_][a-zA-Z0-9_]* ;
STRING : '"' .*? '"' ;
NUMBER : [0-9]+ ;
WS : [ \t\r\n]+ -> skip ;

// Parser rules
program : PROGRAM ID '{' action+ '}' ;

action : ACTION MAIN '{' statement+ '}' ;

statement : assignment
          | printStatement
          ;

assignment : (VALUE | NOTE) ID '=' (NUMBER | STRING) ';' ;

printStatement : NOTES '.' TAKE '(' STRING ')' ';' ;
"#;

/// Grammar files as `(file stem, contents)`
pub fn grammar_files() -> Vec<(&'static str, &'static str)> {
    vec![
        ("SampleDSL", SAMPLE_DSL_GRAMMAR),
        ("Classroom", CLASSROOM_GRAMMAR),
    ]
}

fn example(prompt: &str, details: &str, response: &str) -> Example {
    Example {
        prompt: prompt.to_string(),
        additional_details: Some(details.to_string()),
        response: response.to_string(),
    }
}

/// Example files, one per language
pub fn example_files() -> Vec<ExampleFile> {
    vec![
        ExampleFile {
            language: "csharp".to_string(),
            prompts: vec![
                example(
                    "Create a person POCO",
                    "A plain class with a Name property.",
                    "class Person\n{\n    public string Name { get; set; }\n}",
                ),
                example(
                    "Create a person with a greeting method",
                    "The greeting method should take a string parameter and write a greeting to the console.",
                    "class Person\n{\n    public string Name { get; set; }\n    public void Greeting(string name)\n    {\n        System.Console.WriteLine(\"Hello, {0}. I'm {1}! Nice to meet you!\", name, Name);\n    }\n}",
                ),
            ],
        },
        ExampleFile {
            language: "classroom".to_string(),
            prompts: vec![
                example(
                    "Create a Classroom program with a main action",
                    "Initialize a value variable with 10.",
                    "program ClassroomProgram {\n    action main {\n        value x = 10;\n    }\n}",
                ),
                example(
                    "Create a Classroom program that prints a message",
                    "Use Notes.take to print 'Hello World'.",
                    "program ClassroomProgram {\n    action main {\n        Notes.take(\"Hello World\");\n    }\n}",
                ),
            ],
        },
    ]
}
